// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::engine::RetryPolicy;
use crate::exec::Operation;
use crate::types::{Fatality, OutputMode, ReadinessPolicy};

/// Launch plan exactly as read from TOML.
///
/// ```toml
/// [environment]
/// path = ".venv"
///
/// [sync]
/// cmd = ["git", "pull"]
/// retries = 2
///
/// [service]
/// cmd = ["redis-server"]
/// readiness = { mode = "tcp", address = "127.0.0.1:6379", timeout = "10s" }
/// stop_grace = "5s"
///
/// [app]
/// cmd = ["python", "run.py"]
/// stop_grace = "10s"
/// ```
///
/// Every section is optional; omitted values fall back to the built-in plan.
/// Use `PlanFile::try_from` (or the loader) to get a validated plan.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub environment: EnvironmentSection,

    #[serde(default)]
    pub sync: StageSection,

    #[serde(default)]
    pub deps: StageSection,

    #[serde(default)]
    pub service: RawServiceSection,

    #[serde(default)]
    pub app: RawAppSection,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Directory every command runs in. Relative paths are resolved against
    /// the plan file's directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub readiness_policy: ReadinessPolicy,

    /// Directories searched after `<environment>/bin`.
    #[serde(default)]
    pub fallback_path: Option<Vec<String>>,

    /// Extra variables for every child process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[environment]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentSection {
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Path whose existence means "already provisioned". Defaults to `path`.
    #[serde(default)]
    pub marker: Option<PathBuf>,

    #[serde(default)]
    pub create: Option<Vec<String>>,

    #[serde(default)]
    pub timeout: Option<String>,
}

/// `[sync]` and `[deps]` sections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageSection {
    #[serde(default)]
    pub cmd: Option<Vec<String>>,

    /// Defaults to `true`.
    #[serde(default)]
    pub fatal: Option<bool>,

    #[serde(default)]
    pub timeout: Option<String>,

    /// Extra attempts after a transient failure (nonzero exit or timeout).
    #[serde(default)]
    pub retries: u32,

    #[serde(default)]
    pub retry_delay: Option<String>,

    #[serde(default)]
    pub output: OutputMode,
}

/// `[service]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawServiceSection {
    #[serde(default)]
    pub cmd: Option<Vec<String>>,

    #[serde(default)]
    pub readiness: Option<RawReadiness>,

    /// Time between SIGTERM and SIGKILL when the service is stopped.
    #[serde(default)]
    pub stop_grace: Option<String>,
}

/// `readiness = { mode = ..., ... }` inside `[service]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RawReadiness {
    /// Sleep for `grace` and assume the service is up.
    Delay {
        #[serde(default)]
        grace: Option<String>,
    },
    /// Poll a TCP connect until it succeeds or `timeout` passes.
    Tcp {
        address: String,
        #[serde(default)]
        timeout: Option<String>,
        #[serde(default)]
        interval: Option<String>,
    },
    /// Wait for a service stdout line matching `pattern`.
    Stdout {
        pattern: String,
        #[serde(default)]
        timeout: Option<String>,
    },
}

/// `[app]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAppSection {
    #[serde(default)]
    pub cmd: Option<Vec<String>>,

    /// How long the application gets to exit after an interrupt is
    /// forwarded to it.
    #[serde(default)]
    pub stop_grace: Option<String>,
}

// ---------------------------------------------------------------------------
// Validated plan
// ---------------------------------------------------------------------------

/// A launch plan with defaults applied and every value checked.
///
/// Construct through `TryFrom<RawPlanFile>` so the invariants (non-empty
/// commands, parsable durations, compilable patterns) always hold.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub settings: Settings,
    pub environment: EnvironmentPlan,
    pub sync: StagePlan,
    pub deps: StagePlan,
    pub service: ServicePlan,
    pub app: AppPlan,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub working_dir: Option<PathBuf>,
    pub readiness_policy: ReadinessPolicy,
    pub fallback_path: Vec<String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct EnvironmentPlan {
    pub path: PathBuf,
    pub marker: PathBuf,
    pub create: Operation,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct StagePlan {
    pub operation: Operation,
    pub fatality: Fatality,
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub output: OutputMode,
}

#[derive(Debug, Clone)]
pub struct ServicePlan {
    pub operation: Operation,
    pub readiness: ReadinessSpec,
    pub stop_grace: Duration,
}

#[derive(Debug, Clone)]
pub enum ReadinessSpec {
    Delay {
        grace: Duration,
    },
    Tcp {
        address: String,
        timeout: Duration,
        interval: Duration,
    },
    Stdout {
        pattern: Regex,
        timeout: Duration,
    },
}

impl ReadinessSpec {
    /// Upper bound on how long the readiness gate may hold the pipeline.
    pub fn window(&self) -> Duration {
        match self {
            ReadinessSpec::Delay { grace } => *grace,
            ReadinessSpec::Tcp { timeout, .. } | ReadinessSpec::Stdout { timeout, .. } => {
                *timeout
            }
        }
    }

    /// Whether the service's stdout must be piped for this probe.
    pub fn watches_stdout(&self) -> bool {
        matches!(self, ReadinessSpec::Stdout { .. })
    }
}

#[derive(Debug, Clone)]
pub struct AppPlan {
    pub operation: Operation,
    pub stop_grace: Duration,
}
