// src/engine/supervisor.rs

use tracing::{debug, warn};

use crate::exec::{BackgroundProcess, ProcessBackend};

/// Owns the background service between `start` and shutdown.
///
/// The orchestrator calls [`ServiceSupervisor::release`] once on every exit
/// path (application exit, fatal abort, interrupt). If the supervisor is
/// dropped while still holding a process, the child's kill-on-drop is the
/// last line of cleanup.
#[derive(Debug, Default)]
pub struct ServiceSupervisor {
    process: Option<BackgroundProcess>,
}

impl ServiceSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adopt(&mut self, process: BackgroundProcess) {
        if let Some(previous) = self.process.replace(process) {
            warn!(service = %previous.name(), "replacing a service that was never released");
        }
    }

    pub fn process_mut(&mut self) -> Option<&mut BackgroundProcess> {
        self.process.as_mut()
    }

    /// Terminate the tracked service, if any, through `backend`.
    pub async fn release<B: ProcessBackend + ?Sized>(&mut self, backend: &mut B) {
        match self.process.take() {
            Some(mut process) => backend.terminate_service(&mut process).await,
            None => debug!("no background service to release"),
        }
    }
}

impl Drop for ServiceSupervisor {
    fn drop(&mut self) {
        if let Some(process) = &self.process {
            warn!(
                service = %process.name(),
                pid = ?process.pid(),
                "supervisor dropped without release; killing service on drop"
            );
        }
    }
}
