// src/logging.rs

//! Diagnostics for the launcher itself.
//!
//! Everything is written to stderr. Stdout carries the application's output
//! and the echoed lines of a service watched for its ready line.
//!
//! `--log-level` always wins. Without it, `LAUNCHPAD_LOG` is read as a
//! `tracing_subscriber::EnvFilter` directive list such as
//! `launchpad::readiness=debug,info`. An unusable value falls back to `info`
//! and is reported once the subscriber is up.

use anyhow::{anyhow, Result};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "LAUNCHPAD_LOG";
const DEFAULT_DIRECTIVES: &str = "info";

/// Directives to install, and the environment value that was discarded to
/// get them (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSpec {
    directives: String,
    rejected: Option<String>,
}

/// Install the global subscriber. Call once, before the pipeline starts.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let spec = resolve(cli_level, std::env::var(LOG_ENV).ok().as_deref());

    fmt()
        .with_env_filter(EnvFilter::new(&spec.directives))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    if let Some(value) = spec.rejected {
        warn!(value = %value, "ignoring unusable {LOG_ENV}; logging at {DEFAULT_DIRECTIVES}");
    }
    Ok(())
}

fn resolve(cli_level: Option<LogLevel>, env_value: Option<&str>) -> LogSpec {
    if let Some(level) = cli_level {
        return LogSpec {
            directives: level_directive(level).to_string(),
            rejected: None,
        };
    }

    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) if EnvFilter::try_new(value).is_ok() => LogSpec {
            directives: value.to_string(),
            rejected: None,
        },
        rejected => LogSpec {
            directives: DEFAULT_DIRECTIVES.to_string(),
            rejected: rejected.map(str::to_string),
        },
    }
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
