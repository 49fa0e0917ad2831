// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{
    AppPlan, EnvironmentPlan, PlanFile, RawPlanFile, RawReadiness, ReadinessSpec, ServicePlan,
    Settings, StagePlan, StageSection,
};
use crate::engine::RetryPolicy;
use crate::errors::{LaunchpadError, Result};
use crate::exec::Operation;
use crate::types::{parse_duration, Fatality, MAX_DURATION};

pub const DEFAULT_ENV_PATH: &str = ".venv";
pub const DEFAULT_FALLBACK_PATH: &[&str] = &[
    "/usr/local/sbin",
    "/usr/local/bin",
    "/usr/sbin",
    "/usr/bin",
    "/sbin",
    "/bin",
];
const DEFAULT_SYNC_CMD: &[&str] = &["git", "pull"];
const DEFAULT_DEPS_CMD: &[&str] = &["pip", "install", "-U", "-r", "requirements.txt"];
const DEFAULT_SERVICE_CMD: &[&str] = &["redis-server"];
const DEFAULT_APP_CMD: &[&str] = &["python", "run.py"];
const DEFAULT_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_SERVICE_STOP_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_APP_STOP_GRACE: Duration = Duration::from_secs(10);

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = LaunchpadError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        let settings = Settings {
            working_dir: raw.config.working_dir,
            readiness_policy: raw.config.readiness_policy,
            fallback_path: raw.config.fallback_path.unwrap_or_else(|| {
                DEFAULT_FALLBACK_PATH.iter().map(|s| s.to_string()).collect()
            }),
            env: raw.config.env,
        };

        let env_path = raw
            .environment
            .path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
        if env_path.as_os_str().is_empty() {
            return Err(config_err("[environment].path must not be empty"));
        }
        let create = match raw.environment.create {
            Some(argv) => operation("environment", "create", argv)?,
            None => Operation::new("python3")
                .arg("-m")
                .arg("venv")
                .arg(env_path.to_string_lossy()),
        };
        let environment = EnvironmentPlan {
            marker: raw.environment.marker.unwrap_or_else(|| env_path.clone()),
            path: env_path,
            create,
            timeout: optional_duration("environment", "timeout", raw.environment.timeout)?,
        };

        Ok(PlanFile {
            settings,
            environment,
            sync: stage_plan("sync", raw.sync, DEFAULT_SYNC_CMD)?,
            deps: stage_plan("deps", raw.deps, DEFAULT_DEPS_CMD)?,
            service: ServicePlan {
                operation: operation_or_default("service", raw.service.cmd, DEFAULT_SERVICE_CMD)?,
                readiness: readiness_spec(raw.service.readiness)?,
                stop_grace: optional_duration("service", "stop_grace", raw.service.stop_grace)?
                    .unwrap_or(DEFAULT_SERVICE_STOP_GRACE),
            },
            app: AppPlan {
                operation: operation_or_default("app", raw.app.cmd, DEFAULT_APP_CMD)?,
                stop_grace: optional_duration("app", "stop_grace", raw.app.stop_grace)?
                    .unwrap_or(DEFAULT_APP_STOP_GRACE),
            },
        })
    }
}

fn stage_plan(section: &str, raw: StageSection, default_cmd: &[&str]) -> Result<StagePlan> {
    let retry_delay = optional_duration(section, "retry_delay", raw.retry_delay)?
        .unwrap_or(DEFAULT_RETRY_DELAY);

    Ok(StagePlan {
        operation: operation_or_default(section, raw.cmd, default_cmd)?,
        fatality: Fatality::from_flag(raw.fatal.unwrap_or(true)),
        timeout: optional_duration(section, "timeout", raw.timeout)?,
        retry: RetryPolicy::new(raw.retries, retry_delay),
        output: raw.output,
    })
}

fn readiness_spec(raw: Option<RawReadiness>) -> Result<ReadinessSpec> {
    let spec = match raw {
        None => ReadinessSpec::Delay {
            grace: DEFAULT_GRACE,
        },
        Some(RawReadiness::Delay { grace }) => ReadinessSpec::Delay {
            grace: optional_duration("service.readiness", "grace", grace)?
                .unwrap_or(DEFAULT_GRACE),
        },
        Some(RawReadiness::Tcp {
            address,
            timeout,
            interval,
        }) => {
            if address.trim().is_empty() {
                return Err(config_err("[service].readiness.address must not be empty"));
            }
            let interval = optional_duration("service.readiness", "interval", interval)?
                .unwrap_or(DEFAULT_PROBE_INTERVAL);
            if interval.is_zero() {
                return Err(config_err("[service].readiness.interval must be > 0"));
            }
            ReadinessSpec::Tcp {
                address,
                timeout: probe_timeout(timeout)?,
                interval,
            }
        }
        Some(RawReadiness::Stdout { pattern, timeout }) => {
            let pattern = Regex::new(&pattern).map_err(|e| {
                config_err(format!(
                    "[service].readiness.pattern '{pattern}' is not a valid regex: {e}"
                ))
            })?;
            ReadinessSpec::Stdout {
                pattern,
                timeout: probe_timeout(timeout)?,
            }
        }
    };

    if spec.window().is_zero() {
        return Err(config_err("[service].readiness window must be > 0"));
    }
    Ok(spec)
}

fn probe_timeout(raw: Option<String>) -> Result<Duration> {
    Ok(optional_duration("service.readiness", "timeout", raw)?.unwrap_or(DEFAULT_PROBE_TIMEOUT))
}

fn operation_or_default(
    section: &str,
    argv: Option<Vec<String>>,
    default: &[&str],
) -> Result<Operation> {
    let argv = argv.unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect());
    operation(section, "cmd", argv)
}

fn operation(section: &str, key: &str, argv: Vec<String>) -> Result<Operation> {
    Operation::from_argv(argv).ok_or_else(|| {
        config_err(format!(
            "[{section}].{key} must name a program (got an empty list or empty program)"
        ))
    })
}

fn optional_duration(section: &str, key: &str, raw: Option<String>) -> Result<Option<Duration>> {
    raw.map(|s| {
        let duration =
            parse_duration(&s).map_err(|e| config_err(format!("[{section}].{key}: {e}")))?;
        if duration > MAX_DURATION {
            return Err(config_err(format!(
                "[{section}].{key}: '{s}' exceeds the maximum of {}h",
                MAX_DURATION.as_secs() / 3600
            )));
        }
        Ok(duration)
    })
    .transpose()
}

fn config_err(msg: impl Into<String>) -> LaunchpadError {
    LaunchpadError::ConfigError(msg.into())
}
