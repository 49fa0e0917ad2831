// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `launchpad`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "launchpad",
    version,
    about = "Provision, sync, start the data store, then run the application.",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file for the application.
    ///
    /// Passed through unchanged as the last argument of the app command.
    #[arg(value_name = "APP_CONFIG")]
    pub app_config: String,

    /// Path to the launch plan (TOML).
    ///
    /// Default: `Launchpad.toml` in the current working directory, or the
    /// built-in plan when that file does not exist.
    #[arg(long, value_name = "PATH")]
    pub plan: Option<PathBuf>,

    /// Abort when the data store is not confirmed ready.
    #[arg(long)]
    pub strict_readiness: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LAUNCHPAD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the stage plan, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_app_config_is_required() {
        assert!(CliArgs::try_parse_from(["launchpad"]).is_err());
    }

    #[test]
    fn flags_parse_alongside_positional() {
        let args = CliArgs::try_parse_from([
            "launchpad",
            "--plan",
            "deploy/Launchpad.toml",
            "--strict-readiness",
            "--log-level",
            "debug",
            "config.yml",
        ])
        .unwrap();

        assert_eq!(args.app_config, "config.yml");
        assert_eq!(args.plan, Some(PathBuf::from("deploy/Launchpad.toml")));
        assert!(args.strict_readiness);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(!args.dry_run);
    }
}
