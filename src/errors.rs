// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchpadError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LaunchpadError>;

/// Why a stage did not succeed.
///
/// `SpawnFailure` is permanent (the program could not be started at all);
/// `NonZeroExit` and `Timeout` may be transient and are eligible for retry.
/// `NotReady` is only produced by the readiness gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    #[error("could not start `{program}`: {reason}")]
    SpawnFailure { program: String, reason: String },

    #[error("{}", exit_description(.code, .signal))]
    NonZeroExit { code: i32, signal: Option<i32> },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("not ready: {0}")]
    NotReady(String),
}

impl StageFailure {
    pub fn spawn(program: &str, err: &std::io::Error) -> Self {
        StageFailure::SpawnFailure {
            program: program.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn exit(code: i32) -> Self {
        StageFailure::NonZeroExit { code, signal: None }
    }

    /// Failures worth another attempt under a retry policy.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StageFailure::NonZeroExit { .. } | StageFailure::Timeout(_)
        )
    }
}

fn exit_description(code: &i32, signal: &Option<i32>) -> String {
    match signal {
        Some(sig) => format!("terminated by signal {sig} (status {code})"),
        None => format!("exited with status {code}"),
    }
}
