#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use launchpad::engine::{Orchestrator, Pipeline, Provisioner};
use launchpad::exec::CommandEnv;
use launchpad::fs::mock::MockFileSystem;
use launchpad::readiness::ReadinessProbe;

pub use launchpad_test_utils::builders;
pub use launchpad_test_utils::fake_backend::{Call, CallLog, FakeBackend};
pub use launchpad_test_utils::fake_probe::FakeProbe;
pub use launchpad_test_utils::{init_tracing, with_timeout};

/// Base directory every fake pipeline resolves against.
pub const BASE_DIR: &str = "/srv/bot";
/// Marker of the default environment under [`BASE_DIR`].
pub const MARKER: &str = "/srv/bot/.venv";

/// Orchestrator over a fake backend, an in-memory filesystem and an empty
/// command environment.
pub fn fake_orchestrator(
    pipeline: Pipeline,
    backend: FakeBackend,
    fs: &MockFileSystem,
    probe: impl ReadinessProbe + 'static,
) -> Orchestrator<FakeBackend> {
    Orchestrator::new(
        pipeline,
        backend,
        Provisioner::new(Arc::new(fs.clone())),
        Box::new(probe),
        CommandEnv::default(),
    )
}

/// Wait for a child process to write its pid into `path`.
pub async fn read_pid_file(path: &Path) -> u32 {
    for _ in 0..500 {
        if let Ok(text) = std::fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no pid written to {}", path.display());
}

/// Whether `pid` has exited within a few seconds. Zombies count as exited.
pub async fn pid_exits(pid: u32) -> bool {
    for _ in 0..150 {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => return true,
            Ok(stat) => {
                // State follows the parenthesised command name.
                let state = stat.rsplit_once(')').and_then(|(_, rest)| rest.trim_start().chars().next());
                if state == Some('Z') {
                    return true;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
