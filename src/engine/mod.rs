// src/engine/mod.rs

//! Orchestration engine.
//!
//! The pipeline is strictly linear:
//!
//! `Provisioning -> Syncing -> InstallingDeps -> StartingService ->
//!  AwaitingReadiness -> LaunchingForeground -> Terminal(outcome)`
//!
//! The pure state machine lives in [`core`]; the async/IO shell that drives
//! it is [`orchestrator`]. [`supervisor`] owns the background service handle
//! so it is released on every exit path.

use std::fmt;

use crate::errors::StageFailure;

pub mod core;
pub mod orchestrator;
pub mod provision;
pub mod retry;
pub mod stage;
pub mod supervisor;

pub use self::core::{PhaseReport, PipelineCore, PipelineState};
pub use orchestrator::Orchestrator;
pub use provision::Provisioner;
pub use retry::{run_with_retry, RetryPolicy};
pub use stage::{Environment, Pipeline, Stage};
pub use supervisor::ServiceSupervisor;

/// Exit code when the plan cannot be loaded or validated.
pub const EXIT_CONFIG_ERROR: i32 = 2;
/// Exit code after an operator interrupt (shell convention for SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// One step of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Provisioning,
    Syncing,
    InstallingDeps,
    StartingService,
    AwaitingReadiness,
    LaunchingForeground,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Provisioning,
        Phase::Syncing,
        Phase::InstallingDeps,
        Phase::StartingService,
        Phase::AwaitingReadiness,
        Phase::LaunchingForeground,
    ];

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Provisioning => Some(Phase::Syncing),
            Phase::Syncing => Some(Phase::InstallingDeps),
            Phase::InstallingDeps => Some(Phase::StartingService),
            Phase::StartingService => Some(Phase::AwaitingReadiness),
            Phase::AwaitingReadiness => Some(Phase::LaunchingForeground),
            Phase::LaunchingForeground => None,
        }
    }

    /// Name used in logs and operator-facing messages.
    pub fn stage_name(self) -> &'static str {
        match self {
            Phase::Provisioning => "provision",
            Phase::Syncing => "sync",
            Phase::InstallingDeps => "deps",
            Phase::StartingService => "service",
            Phase::AwaitingReadiness => "readiness",
            Phase::LaunchingForeground => "app",
        }
    }

    /// Process exit code when the run aborts in this phase.
    pub fn abort_exit_code(self) -> i32 {
        match self {
            Phase::Provisioning => 10,
            Phase::Syncing => 11,
            Phase::InstallingDeps => 12,
            Phase::StartingService => 13,
            Phase::AwaitingReadiness => 14,
            Phase::LaunchingForeground => 15,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage_name())
    }
}

/// The single terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The application exited 0.
    Success,
    /// The application exited nonzero; the code is propagated verbatim.
    ForegroundExit(i32),
    /// A fatal failure stopped the pipeline.
    Aborted { phase: Phase, failure: StageFailure },
    /// An operator interrupt stopped the pipeline.
    Interrupted,
}

impl RunOutcome {
    pub fn from_foreground(code: i32) -> Self {
        if code == 0 {
            RunOutcome::Success
        } else {
            RunOutcome::ForegroundExit(code)
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::ForegroundExit(code) => *code,
            RunOutcome::Aborted { phase, .. } => phase.abort_exit_code(),
            RunOutcome::Interrupted => EXIT_INTERRUPTED,
        }
    }

    /// Operator-facing line for stderr, if the outcome warrants one.
    /// The application's own failures are left to the application.
    pub fn summary(&self) -> Option<String> {
        match self {
            RunOutcome::Aborted { phase, failure } => {
                Some(format!("launchpad: stage '{phase}' failed: {failure}"))
            }
            RunOutcome::Interrupted => Some("launchpad: interrupted".to_string()),
            RunOutcome::Success | RunOutcome::ForegroundExit(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn phases_chain_in_order() {
        let mut chain = vec![Phase::Provisioning];
        while let Some(next) = chain.last().copied().and_then(Phase::next) {
            chain.push(next);
        }
        assert_eq!(chain, Phase::ALL.to_vec());
    }

    #[test]
    fn abort_codes_are_distinct_and_clear_of_reserved_codes() {
        let codes: HashSet<i32> = Phase::ALL.iter().map(|p| p.abort_exit_code()).collect();
        assert_eq!(codes.len(), Phase::ALL.len());
        assert!(!codes.contains(&0));
        assert!(!codes.contains(&EXIT_CONFIG_ERROR));
        assert!(!codes.contains(&EXIT_INTERRUPTED));
    }

    #[test]
    fn foreground_codes_pass_through() {
        for code in [0, 1, 137, 255] {
            assert_eq!(RunOutcome::from_foreground(code).exit_code(), code);
        }
        assert_eq!(RunOutcome::from_foreground(0), RunOutcome::Success);
    }

    #[test]
    fn abort_summary_names_stage_and_status() {
        let outcome = RunOutcome::Aborted {
            phase: Phase::Syncing,
            failure: StageFailure::exit(128),
        };
        assert_eq!(outcome.exit_code(), 11);
        assert_eq!(
            outcome.summary().as_deref(),
            Some("launchpad: stage 'sync' failed: exited with status 128")
        );
        assert_eq!(RunOutcome::ForegroundExit(3).summary(), None);
    }
}
