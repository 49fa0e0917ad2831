// src/exec/service.rs

//! Background service process: spawn, observe, terminate.

use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::ServicePlan;
use crate::config::ReadinessSpec;
use crate::errors::StageFailure;
use crate::exec::command::{exit_code, CommandEnv};
use crate::exec::signal::{own_process_group, signal_group, StopSignal};
use crate::types::MAX_DURATION;

/// A long-running auxiliary process started by the orchestrator.
///
/// The process keeps running after `start_service` returns. Whoever holds
/// this value is responsible for calling [`BackgroundProcess::terminate`];
/// the child is also killed if the value is dropped.
#[derive(Debug)]
pub struct BackgroundProcess {
    name: String,
    pid: Option<u32>,
    started_at: Instant,
    deadline: Instant,
    stop_grace: Duration,
    child: Option<Child>,
    ready_rx: Option<watch::Receiver<bool>>,
}

impl BackgroundProcess {
    pub fn spawned(
        name: impl Into<String>,
        child: Child,
        window: Duration,
        ready_rx: Option<watch::Receiver<bool>>,
    ) -> Self {
        let started_at = Instant::now();
        Self {
            name: name.into(),
            pid: child.id(),
            started_at,
            deadline: started_at + window.min(MAX_DURATION),
            stop_grace: Duration::ZERO,
            child: Some(child),
            ready_rx,
        }
    }

    /// A handle with no OS process behind it. It never exits on its own.
    /// Used by fake backends.
    pub fn detached(name: impl Into<String>, window: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            name: name.into(),
            pid: None,
            started_at,
            deadline: started_at + window.min(MAX_DURATION),
            stop_grace: Duration::ZERO,
            child: None,
            ready_rx: None,
        }
    }

    /// Attach a stdout readiness signal (normally wired by `start_service`).
    pub fn with_ready_signal(mut self, rx: watch::Receiver<bool>) -> Self {
        self.ready_rx = Some(rx);
        self
    }

    /// How long `terminate` waits after SIGTERM before killing.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Point after which the readiness gate gives up on this service.
    pub fn readiness_deadline(&self) -> Instant {
        self.deadline
    }

    /// Flips to `true` once the service printed its ready line.
    pub fn ready_signal(&self) -> Option<watch::Receiver<bool>> {
        self.ready_rx.clone()
    }

    /// Resolve once the process has exited, with its exit code.
    /// Pending forever for detached handles.
    pub async fn exited(&mut self) -> i32 {
        match self.child.as_mut() {
            Some(child) => match child.wait().await {
                Ok(status) => exit_code(&status),
                Err(e) => {
                    warn!(service = %self.name, error = %e, "waiting for service process failed");
                    -1
                }
            },
            None => std::future::pending().await,
        }
    }

    /// Stop the service's whole process group: SIGTERM, wait up to the stop
    /// grace, then SIGKILL whatever is left.
    ///
    /// Returns the exit code when the process had already exited by itself.
    pub async fn terminate(&mut self) -> Option<i32> {
        let child = self.child.as_mut()?;

        match child.try_wait() {
            Ok(Some(status)) => {
                let code = exit_code(&status);
                info!(service = %self.name, exit_code = code, "service had already exited");
                if let Some(pgid) = self.pid {
                    signal_group(pgid, StopSignal::Kill);
                }
                return Some(code);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(service = %self.name, error = %e, "could not poll service process");
            }
        }

        info!(service = %self.name, pid = ?self.pid, grace = ?self.stop_grace, "terminating background service");
        let asked = self
            .pid
            .is_some_and(|pgid| signal_group(pgid, StopSignal::Terminate));

        let stopped = asked
            && matches!(timeout(self.stop_grace, child.wait()).await, Ok(Ok(_)));
        if !stopped {
            warn!(service = %self.name, "service still running; killing");
            if let Err(e) = child.kill().await {
                warn!(service = %self.name, error = %e, "failed to kill background service");
            }
        }
        if let Some(pgid) = self.pid {
            signal_group(pgid, StopSignal::Kill);
        }
        None
    }
}

/// Spawn the service without waiting for it.
///
/// Stdin is closed. Stdout is piped only for the `stdout` readiness probe;
/// piped lines are still echoed to the orchestrator's stdout.
pub fn start_service(
    service: &ServicePlan,
    env: &CommandEnv,
) -> Result<BackgroundProcess, StageFailure> {
    let operation = &service.operation;
    info!(cmd = %operation, "starting background service");

    let mut cmd = operation.command(env);
    cmd.stdin(Stdio::null());
    own_process_group(&mut cmd);
    if service.readiness.watches_stdout() {
        cmd.stdout(Stdio::piped());
    }

    let mut child = cmd.spawn().map_err(|e| {
        warn!(program = %operation.program, error = %e, "failed to spawn background service");
        StageFailure::spawn(&operation.program, &e)
    })?;

    let ready_rx = match (&service.readiness, child.stdout.take()) {
        (ReadinessSpec::Stdout { pattern, .. }, Some(stdout)) => Some(spawn_ready_monitor(
            operation.program.clone(),
            pattern.clone(),
            stdout,
        )),
        _ => None,
    };

    let process = BackgroundProcess::spawned(
        operation.program.clone(),
        child,
        service.readiness.window(),
        ready_rx,
    )
    .with_stop_grace(service.stop_grace);
    info!(service = %process.name(), pid = ?process.pid(), "background service started");
    Ok(process)
}

/// Echo service stdout and flip the returned signal on the first line
/// matching `pattern`. The sender is dropped when stdout closes.
fn spawn_ready_monitor(
    name: String,
    pattern: Regex,
    stdout: ChildStdout,
) -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("{line}");
            if !*tx.borrow() && pattern.is_match(&line) {
                debug!(service = %name, "stdout matched readiness pattern");
                let _ = tx.send(true);
            }
        }
        debug!(service = %name, "service stdout closed");
    });

    rx
}
