// src/exec/signal.rs

//! Signal delivery to child processes and their process groups.
//!
//! The background service and timed stages run in their own process group
//! (pgid == pid of the spawned child), so stopping them reaches wrappers
//! like `sh -c` and whatever they started.

use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

/// The two ways the orchestrator stops a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Ask politely (SIGTERM).
    Terminate,
    /// SIGKILL.
    Kill,
}

/// Send `signal` to a single process. Returns `false` if it could not be
/// delivered (already gone, bad pid, non-unix).
pub fn signal_process(pid: u32, signal: StopSignal) -> bool {
    imp::deliver(pid, signal, false)
}

/// Send `signal` to every process in the group led by `pgid`.
pub fn signal_group(pgid: u32, signal: StopSignal) -> bool {
    imp::deliver(pgid, signal, true)
}

/// Make the spawned child lead a new process group of its own.
pub fn own_process_group(cmd: &mut Command) {
    imp::own_process_group(cmd);
}

/// Resolves once `shutdown` observes `true`. Never resolves without a
/// receiver or after the sender is gone.
pub async fn stop_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = shutdown {
        if rx.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

/// SIGKILLs a process group when dropped, unless disarmed first.
///
/// Covers the paths where a stage future is dropped mid-flight (interrupt)
/// and `kill_on_drop` would only reach the direct child.
#[derive(Debug)]
pub struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    pub fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    pub fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            debug!(pgid, "killing process group on drop");
            signal_group(pgid, StopSignal::Kill);
        }
    }
}

#[cfg(unix)]
mod imp {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::{setpgid, Pid};
    use tokio::process::Command;
    use tracing::debug;

    use super::StopSignal;

    pub(super) fn own_process_group(cmd: &mut Command) {
        // SAFETY: setpgid is async-signal-safe and touches no parent state.
        unsafe {
            cmd.pre_exec(|| {
                setpgid(Pid::from_raw(0), Pid::from_raw(0))?;
                Ok(())
            });
        }
    }

    pub(super) fn deliver(raw: u32, signal: StopSignal, group: bool) -> bool {
        let Some(pid) = i32::try_from(raw).ok().filter(|p| *p > 0).map(Pid::from_raw) else {
            return false;
        };
        let sig = match signal {
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        };
        let result = if group { killpg(pid, sig) } else { kill(pid, sig) };
        match result {
            Ok(()) => true,
            Err(errno) => {
                debug!(pid = raw, group, ?sig, %errno, "signal not delivered");
                false
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use tokio::process::Command;

    use super::StopSignal;

    pub(super) fn own_process_group(_cmd: &mut Command) {}

    pub(super) fn deliver(_raw: u32, _signal: StopSignal, _group: bool) -> bool {
        false
    }
}
