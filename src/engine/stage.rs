// src/engine/stage.rs

//! Static stage definitions, fixed when the orchestrator is built.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{PlanFile, ServicePlan, StagePlan};
use crate::engine::{Phase, RetryPolicy};
use crate::exec::{CommandEnv, Operation};
use crate::types::{Fatality, OutputMode, ReadinessPolicy};

/// One finite pipeline step backed by an external command.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub phase: Phase,
    pub operation: Operation,
    pub fatality: Fatality,
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub output: OutputMode,
}

impl Stage {
    /// Fatal, no timeout, no retries, inherited output.
    pub fn new(phase: Phase, operation: Operation) -> Self {
        Self {
            name: phase.stage_name().to_string(),
            phase,
            operation,
            fatality: Fatality::Fatal,
            timeout: None,
            retry: RetryPolicy::none(),
            output: OutputMode::Inherit,
        }
    }

    fn from_plan(phase: Phase, plan: &StagePlan) -> Self {
        Self {
            fatality: plan.fatality,
            timeout: plan.timeout,
            retry: plan.retry,
            output: plan.output,
            ..Self::new(phase, plan.operation.clone())
        }
    }
}

/// The isolated runtime the pipeline provisions.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Absolute root of the environment; `<root>/bin` leads `PATH`.
    pub root: PathBuf,
    /// Existence of this path means the environment is already provisioned.
    pub marker: PathBuf,
    /// Runs only when the marker is missing.
    pub create: Stage,
}

/// Everything the orchestrator runs, in order.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub working_dir: PathBuf,
    pub environment: Environment,
    pub sync: Stage,
    pub deps: Stage,
    pub service: ServicePlan,
    /// Application command with the app config path appended.
    pub app: Operation,
    /// How long the application may take to exit once termination is
    /// forwarded to it.
    pub app_stop_grace: Duration,
    pub readiness_policy: ReadinessPolicy,
}

impl Pipeline {
    /// Resolve a validated plan against `base_dir` (the plan file's
    /// directory) and append `app_config` to the application command.
    pub fn from_plan(plan: &PlanFile, base_dir: &Path, app_config: &str) -> Self {
        let working_dir = match &plan.settings.working_dir {
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        };

        let create = Stage {
            timeout: plan.environment.timeout,
            ..Stage::new(Phase::Provisioning, plan.environment.create.clone())
        };

        Self {
            environment: Environment {
                root: working_dir.join(&plan.environment.path),
                marker: working_dir.join(&plan.environment.marker),
                create,
            },
            sync: Stage::from_plan(Phase::Syncing, &plan.sync),
            deps: Stage::from_plan(Phase::InstallingDeps, &plan.deps),
            service: plan.service.clone(),
            app: plan.app.operation.clone().arg(app_config),
            app_stop_grace: plan.app.stop_grace,
            readiness_policy: plan.settings.readiness_policy,
            working_dir,
        }
    }

    /// Environment handed to every child process.
    pub fn command_env(&self, plan: &PlanFile) -> CommandEnv {
        CommandEnv::for_environment(
            &self.environment.root,
            &plan.settings.fallback_path,
            &plan.settings.env,
        )
        .with_working_dir(&self.working_dir)
    }

    /// Human-readable plan, one line per stage, for `--dry-run`.
    pub fn describe(&self, readiness: &str) -> Vec<String> {
        let mut lines = vec![format!(
            "{:<10} {} (skipped if {} exists)",
            Phase::Provisioning.stage_name(),
            self.environment.create.operation,
            self.environment.marker.display()
        )];
        for stage in [&self.sync, &self.deps] {
            let mut line = format!("{:<10} {}", stage.name, stage.operation);
            if !stage.fatality.is_fatal() {
                line.push_str(" [non-fatal]");
            }
            if let Some(timeout) = stage.timeout {
                line.push_str(&format!(" [timeout {timeout:?}]"));
            }
            if stage.retry.max_retries > 0 {
                line.push_str(&format!(" [retries {}]", stage.retry.max_retries));
            }
            lines.push(line);
        }
        lines.push(format!(
            "{:<10} {} (background)",
            Phase::StartingService.stage_name(),
            self.service.operation
        ));
        lines.push(format!(
            "{:<10} {readiness} [{:?}]",
            Phase::AwaitingReadiness.stage_name(),
            self.readiness_policy
        ));
        lines.push(format!(
            "{:<10} {}",
            Phase::LaunchingForeground.stage_name(),
            self.app
        ));
        lines
    }
}
