#![allow(dead_code)]

use std::path::{Path, PathBuf};

use launchpad::config::{PlanFile, RawPlanFile, RawReadiness, StageSection};
use launchpad::engine::Pipeline;

/// Builder for `PlanFile` to simplify test setup.
///
/// Starts from the built-in plan with a short delay readiness window so
/// tests never sleep for seconds.
pub struct PlanBuilder {
    raw: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        let mut raw = RawPlanFile::default();
        raw.service.readiness = Some(RawReadiness::Delay {
            grace: Some("10ms".to_string()),
        });
        Self { raw }
    }

    pub fn environment(mut self, path: &str) -> Self {
        self.raw.environment.path = Some(PathBuf::from(path));
        self
    }

    pub fn marker(mut self, path: &str) -> Self {
        self.raw.environment.marker = Some(PathBuf::from(path));
        self
    }

    pub fn create(mut self, argv: &[&str]) -> Self {
        self.raw.environment.create = Some(strings(argv));
        self
    }

    pub fn sync(mut self, stage: StageSection) -> Self {
        self.raw.sync = stage;
        self
    }

    pub fn deps(mut self, stage: StageSection) -> Self {
        self.raw.deps = stage;
        self
    }

    pub fn service(mut self, argv: &[&str]) -> Self {
        self.raw.service.cmd = Some(strings(argv));
        self
    }

    pub fn readiness(mut self, readiness: RawReadiness) -> Self {
        self.raw.service.readiness = Some(readiness);
        self
    }

    pub fn service_stop_grace(mut self, grace: &str) -> Self {
        self.raw.service.stop_grace = Some(grace.to_string());
        self
    }

    pub fn app_stop_grace(mut self, grace: &str) -> Self {
        self.raw.app.stop_grace = Some(grace.to_string());
        self
    }

    pub fn app(mut self, argv: &[&str]) -> Self {
        self.raw.app.cmd = Some(strings(argv));
        self
    }

    pub fn strict(mut self) -> Self {
        self.raw.config.readiness_policy = launchpad::types::ReadinessPolicy::Strict;
        self
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.raw).expect("Failed to build valid plan from builder")
    }

    /// Build and resolve against `base_dir` with `app_config` appended.
    pub fn pipeline(self, base_dir: impl AsRef<Path>, app_config: &str) -> Pipeline {
        Pipeline::from_plan(&self.build(), base_dir.as_ref(), app_config)
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `[sync]` / `[deps]` sections.
pub struct StageBuilder {
    stage: StageSection,
}

impl StageBuilder {
    pub fn new(argv: &[&str]) -> Self {
        Self {
            stage: StageSection {
                cmd: Some(strings(argv)),
                ..StageSection::default()
            },
        }
    }

    pub fn fatal(mut self, val: bool) -> Self {
        self.stage.fatal = Some(val);
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.stage.timeout = Some(duration.to_string());
        self
    }

    pub fn retries(mut self, retries: u32, delay: &str) -> Self {
        self.stage.retries = retries;
        self.stage.retry_delay = Some(delay.to_string());
        self
    }

    pub fn capture(mut self) -> Self {
        self.stage.output = launchpad::types::OutputMode::Capture;
        self
    }

    pub fn build(self) -> StageSection {
        self.stage
    }
}

fn strings(argv: &[&str]) -> Vec<String> {
    argv.iter().map(|s| s.to_string()).collect()
}
