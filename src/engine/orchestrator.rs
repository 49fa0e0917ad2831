// src/engine/orchestrator.rs

//! Async shell around [`PipelineCore`].
//!
//! Executes one phase at a time through a [`ProcessBackend`], feeds the
//! report into the core and stops at the first terminal state. The
//! background service is released before `run` returns, whatever the
//! outcome.
//!
//! An interrupt cancels every phase except the application's: a running
//! application is asked to stop and its exit code becomes the outcome.

use std::fmt;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::engine::core::{PhaseReport, PipelineCore, PipelineState};
use crate::engine::{run_with_retry, Phase, Pipeline, Provisioner, RunOutcome, ServiceSupervisor};
use crate::exec::signal::stop_requested;
use crate::exec::{CommandEnv, ProcessBackend, StageResult};
use crate::readiness::{Readiness, ReadinessProbe};
use crate::types::Fatality;

pub struct Orchestrator<B: ProcessBackend> {
    pipeline: Pipeline,
    backend: B,
    provisioner: Provisioner,
    probe: Box<dyn ReadinessProbe>,
    env: CommandEnv,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<B: ProcessBackend> fmt::Debug for Orchestrator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pipeline", &self.pipeline)
            .field("probe", &self.probe.describe())
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend> Orchestrator<B> {
    pub fn new(
        pipeline: Pipeline,
        backend: B,
        provisioner: Provisioner,
        probe: Box<dyn ReadinessProbe>,
        env: CommandEnv,
    ) -> Self {
        Self {
            pipeline,
            backend,
            provisioner,
            probe,
            env,
            shutdown: None,
        }
    }

    /// Stop the run as soon as the receiver observes `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Drive the pipeline to its single terminal outcome.
    pub async fn run(mut self) -> RunOutcome {
        info!(
            readiness = %self.probe.describe(),
            policy = ?self.pipeline.readiness_policy,
            "launch pipeline started"
        );

        let mut core = PipelineCore::new(self.pipeline.readiness_policy);
        let mut supervisor = ServiceSupervisor::new();
        let mut shutdown = self.shutdown.clone();

        let outcome = loop {
            let phase = match core.state() {
                PipelineState::Running(phase) => *phase,
                PipelineState::Terminal(outcome) => break outcome.clone(),
            };
            info!(stage = %phase, "entering stage");

            let report = if phase == Phase::LaunchingForeground {
                self.execute(phase, &mut supervisor).await
            } else {
                tokio::select! {
                    report = self.execute(phase, &mut supervisor) => report,
                    _ = stop_requested(&mut shutdown) => {
                        warn!(stage = %phase, "interrupt received; stopping pipeline");
                        PhaseReport::Interrupted
                    }
                }
            };
            core.advance(report);
        };

        supervisor.release(&mut self.backend).await;

        match &outcome {
            RunOutcome::Aborted { phase, failure } => {
                error!(stage = %phase, error = %failure, exit_code = outcome.exit_code(), "pipeline aborted");
            }
            other => info!(outcome = ?other, exit_code = other.exit_code(), "pipeline finished"),
        }
        outcome
    }

    async fn execute(&mut self, phase: Phase, supervisor: &mut ServiceSupervisor) -> PhaseReport {
        match phase {
            Phase::Provisioning => {
                let result = self
                    .provisioner
                    .ensure(&self.pipeline.environment, &mut self.backend, &self.env)
                    .await;
                report_stage(result, self.pipeline.environment.create.fatality)
            }
            Phase::Syncing => {
                let result = run_with_retry(&mut self.backend, &self.pipeline.sync, &self.env).await;
                report_stage(result, self.pipeline.sync.fatality)
            }
            Phase::InstallingDeps => {
                let result = run_with_retry(&mut self.backend, &self.pipeline.deps, &self.env).await;
                report_stage(result, self.pipeline.deps.fatality)
            }
            Phase::StartingService => {
                match self
                    .backend
                    .start_service(&self.pipeline.service, &self.env)
                    .await
                {
                    Ok(process) => {
                        info!(service = %process.name(), pid = ?process.pid(), "service started");
                        supervisor.adopt(process);
                        PhaseReport::Passed
                    }
                    Err(failure) => PhaseReport::Failed {
                        failure,
                        fatality: Fatality::Fatal,
                    },
                }
            }
            Phase::AwaitingReadiness => {
                let Some(process) = supervisor.process_mut() else {
                    return PhaseReport::NotReady("no service is being supervised".to_string());
                };
                match self.probe.await_ready(process).await {
                    Readiness::Ready => {
                        info!(
                            readiness = %self.probe.describe(),
                            elapsed = ?process.started_at().elapsed(),
                            "service ready"
                        );
                        PhaseReport::Passed
                    }
                    Readiness::NotReady(reason) => PhaseReport::NotReady(reason),
                }
            }
            Phase::LaunchingForeground => self.launch_foreground(self.shutdown.clone()).await,
        }
    }

    /// Run the application to completion. An interrupt arriving while it
    /// runs is forwarded to it instead of cancelling the phase.
    async fn launch_foreground(&mut self, shutdown: Option<watch::Receiver<bool>>) -> PhaseReport {
        if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
            warn!("interrupt received before launch; not starting application");
            return PhaseReport::Interrupted;
        }
        let grace = self.pipeline.app_stop_grace;
        match self
            .backend
            .run_foreground(&self.pipeline.app, &self.env, shutdown, grace)
            .await
        {
            Ok(code) => PhaseReport::ForegroundExited(code),
            Err(failure) => PhaseReport::Failed {
                failure,
                fatality: Fatality::Fatal,
            },
        }
    }
}

fn report_stage(result: StageResult, fatality: Fatality) -> PhaseReport {
    match result.failure() {
        None => {
            info!(
                stage = %result.stage,
                skipped = result.skipped,
                attempts = result.attempts,
                "stage succeeded"
            );
            PhaseReport::Passed
        }
        Some(failure) => {
            warn!(
                stage = %result.stage,
                attempts = result.attempts,
                error = %failure,
                fatal = fatality.is_fatal(),
                "stage failed"
            );
            PhaseReport::Failed {
                failure: failure.clone(),
                fatality,
            }
        }
    }
}
