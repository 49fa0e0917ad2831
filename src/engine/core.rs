// src/engine/core.rs

//! Pure pipeline state machine.
//!
//! `PipelineCore` consumes one [`PhaseReport`] per executed phase and moves
//! to the next phase or to a terminal outcome. It has no Tokio types, no
//! processes and no IO, so every transition is unit testable.

use tracing::{debug, warn};

use crate::engine::{Phase, RunOutcome};
use crate::errors::StageFailure;
use crate::types::{Fatality, ReadinessPolicy};

/// Where the pipeline currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Running(Phase),
    Terminal(RunOutcome),
}

/// What happened while executing the current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseReport {
    Passed,
    Failed {
        failure: StageFailure,
        fatality: Fatality,
    },
    /// The readiness gate gave up on the service.
    NotReady(String),
    /// The application exited with this code.
    ForegroundExited(i32),
    Interrupted,
}

#[derive(Debug)]
pub struct PipelineCore {
    state: PipelineState,
    policy: ReadinessPolicy,
}

impl PipelineCore {
    pub fn new(policy: ReadinessPolicy) -> Self {
        Self {
            state: PipelineState::Running(Phase::Provisioning),
            policy,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn current_phase(&self) -> Option<Phase> {
        match self.state {
            PipelineState::Running(phase) => Some(phase),
            PipelineState::Terminal(_) => None,
        }
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        match &self.state {
            PipelineState::Running(_) => None,
            PipelineState::Terminal(outcome) => Some(outcome),
        }
    }

    /// Apply the report for the current phase. Terminal states absorb
    /// further reports unchanged.
    pub fn advance(&mut self, report: PhaseReport) -> &PipelineState {
        let PipelineState::Running(phase) = self.state else {
            debug!(?report, "pipeline already terminal; ignoring report");
            return &self.state;
        };

        self.state = match report {
            PhaseReport::Passed => Self::after(phase),
            PhaseReport::Failed { failure, fatality } => {
                if fatality.is_fatal() {
                    PipelineState::Terminal(RunOutcome::Aborted { phase, failure })
                } else {
                    warn!(stage = %phase, error = %failure, "non-fatal stage failed; continuing");
                    Self::after(phase)
                }
            }
            PhaseReport::NotReady(reason) => match self.policy {
                ReadinessPolicy::Strict => PipelineState::Terminal(RunOutcome::Aborted {
                    phase,
                    failure: StageFailure::NotReady(reason),
                }),
                ReadinessPolicy::Optimistic => {
                    warn!(stage = %phase, %reason, "service not confirmed ready; continuing anyway");
                    Self::after(phase)
                }
            },
            PhaseReport::ForegroundExited(code) => {
                debug_assert_eq!(phase, Phase::LaunchingForeground);
                PipelineState::Terminal(RunOutcome::from_foreground(code))
            }
            PhaseReport::Interrupted => PipelineState::Terminal(RunOutcome::Interrupted),
        };

        &self.state
    }

    fn after(phase: Phase) -> PipelineState {
        match phase.next() {
            Some(next) => PipelineState::Running(next),
            None => PipelineState::Terminal(RunOutcome::Success),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fatal(code: i32) -> PhaseReport {
        PhaseReport::Failed {
            failure: StageFailure::exit(code),
            fatality: Fatality::Fatal,
        }
    }

    fn advance_to(core: &mut PipelineCore, target: Phase) {
        while core.current_phase() != Some(target) {
            core.advance(PhaseReport::Passed);
        }
    }

    #[test]
    fn starts_provisioning_and_walks_linearly() {
        let mut core = PipelineCore::new(ReadinessPolicy::Optimistic);
        assert_eq!(core.current_phase(), Some(Phase::Provisioning));

        for expected in Phase::ALL.iter().skip(1) {
            core.advance(PhaseReport::Passed);
            assert_eq!(core.current_phase(), Some(*expected));
        }

        core.advance(PhaseReport::ForegroundExited(0));
        assert_eq!(core.outcome(), Some(&RunOutcome::Success));
    }

    #[test]
    fn fatal_failure_aborts_at_that_phase() {
        let mut core = PipelineCore::new(ReadinessPolicy::Optimistic);
        advance_to(&mut core, Phase::Syncing);

        core.advance(fatal(1));
        assert_eq!(
            core.outcome(),
            Some(&RunOutcome::Aborted {
                phase: Phase::Syncing,
                failure: StageFailure::exit(1)
            })
        );
        assert_eq!(core.outcome().map(RunOutcome::exit_code), Some(11));
    }

    #[test]
    fn non_fatal_failure_moves_on() {
        let mut core = PipelineCore::new(ReadinessPolicy::Optimistic);
        advance_to(&mut core, Phase::InstallingDeps);

        core.advance(PhaseReport::Failed {
            failure: StageFailure::exit(1),
            fatality: Fatality::NonFatal,
        });
        assert_eq!(core.current_phase(), Some(Phase::StartingService));
    }

    #[test]
    fn not_ready_depends_on_policy() {
        let mut optimistic = PipelineCore::new(ReadinessPolicy::Optimistic);
        advance_to(&mut optimistic, Phase::AwaitingReadiness);
        optimistic.advance(PhaseReport::NotReady("quiet".into()));
        assert_eq!(optimistic.current_phase(), Some(Phase::LaunchingForeground));

        let mut strict = PipelineCore::new(ReadinessPolicy::Strict);
        advance_to(&mut strict, Phase::AwaitingReadiness);
        strict.advance(PhaseReport::NotReady("quiet".into()));
        assert_eq!(
            strict.outcome(),
            Some(&RunOutcome::Aborted {
                phase: Phase::AwaitingReadiness,
                failure: StageFailure::NotReady("quiet".into())
            })
        );
        assert_eq!(strict.outcome().map(RunOutcome::exit_code), Some(14));
    }

    #[test]
    fn foreground_exit_code_is_verbatim() {
        for code in [1, 137, 255] {
            let mut core = PipelineCore::new(ReadinessPolicy::Optimistic);
            advance_to(&mut core, Phase::LaunchingForeground);
            core.advance(PhaseReport::ForegroundExited(code));
            assert_eq!(core.outcome(), Some(&RunOutcome::ForegroundExit(code)));
        }
    }

    #[test]
    fn interrupt_is_terminal_from_any_phase() {
        for phase in Phase::ALL {
            let mut core = PipelineCore::new(ReadinessPolicy::Optimistic);
            advance_to(&mut core, phase);
            core.advance(PhaseReport::Interrupted);
            assert_eq!(core.outcome(), Some(&RunOutcome::Interrupted));
        }
    }

    #[test]
    fn terminal_state_absorbs_reports() {
        let mut core = PipelineCore::new(ReadinessPolicy::Optimistic);
        core.advance(fatal(2));
        let before = core.state().clone();

        core.advance(PhaseReport::Passed);
        core.advance(PhaseReport::ForegroundExited(0));
        assert_eq!(core.state(), &before);
    }
}
