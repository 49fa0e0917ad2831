// src/engine/provision.rs

use std::sync::Arc;

use tracing::{info, warn};

use crate::engine::Environment;
use crate::exec::{CommandEnv, ProcessBackend, StageResult};
use crate::fs::FileSystem;

/// Creates the isolated environment when, and only when, its marker is
/// missing.
#[derive(Debug, Clone)]
pub struct Provisioner {
    fs: Arc<dyn FileSystem>,
}

impl Provisioner {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn is_provisioned(&self, environment: &Environment) -> bool {
        self.fs.exists(&environment.marker)
    }

    /// Idempotent: with the marker present no command is run and the result
    /// is a skipped success.
    pub async fn ensure<B: ProcessBackend + ?Sized>(
        &self,
        environment: &Environment,
        backend: &mut B,
        env: &CommandEnv,
    ) -> StageResult {
        if self.is_provisioned(environment) {
            info!(
                marker = %environment.marker.display(),
                "environment already provisioned; skipping creation"
            );
            return StageResult::skipped(&environment.create.name);
        }

        info!(
            root = %environment.root.display(),
            cmd = %environment.create.operation,
            "creating environment"
        );
        let result = backend.run_stage(&environment.create, env).await;

        if result.is_success() && !self.is_provisioned(environment) {
            warn!(
                marker = %environment.marker.display(),
                "environment command succeeded but marker is still missing; it will be recreated next run"
            );
        }
        result
    }
}
