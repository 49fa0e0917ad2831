// src/exec/foreground.rs

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::errors::StageFailure;
use crate::exec::command::{exit_code, CommandEnv, Operation};
use crate::exec::signal::{signal_process, stop_requested, StopSignal};

/// Run the application with inherited stdio and wait for it.
///
/// The exit code is returned verbatim (`128 + signal` for signal deaths).
/// When `shutdown` flips to `true` the application gets SIGTERM and
/// `stop_grace` to exit on its own before it is killed; whatever code it
/// exits with is still returned. Dropping the future kills the application.
///
/// The application stays in the launcher's process group so it keeps the
/// terminal.
pub async fn run_foreground(
    app: &Operation,
    env: &CommandEnv,
    shutdown: Option<watch::Receiver<bool>>,
    stop_grace: Duration,
) -> Result<i32, StageFailure> {
    info!(cmd = %app, "launching application");

    let mut child = app.command(env).spawn().map_err(|e| {
        error!(program = %app.program, error = %e, "failed to spawn application");
        StageFailure::spawn(&app.program, &e)
    })?;
    let pid = child.id();
    info!(pid = ?pid, "application running");

    let mut shutdown = shutdown;
    let waited = tokio::select! {
        status = child.wait() => status,
        _ = stop_requested(&mut shutdown) => {
            info!(pid = ?pid, grace = ?stop_grace, "forwarding termination to application");
            if let Some(pid) = pid {
                signal_process(pid, StopSignal::Terminate);
            }
            match timeout(stop_grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(grace = ?stop_grace, "application still running after grace; killing");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill application");
                    }
                    child.wait().await
                }
            }
        }
    };

    match waited {
        Ok(status) => {
            let code = exit_code(&status);
            info!(exit_code = code, "application exited");
            Ok(code)
        }
        Err(e) => {
            warn!(error = %e, "waiting for application failed");
            Err(StageFailure::exit(-1))
        }
    }
}
