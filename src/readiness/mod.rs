// src/readiness/mod.rs

//! Readiness gate for the background service.
//!
//! All probes share one interface so the orchestrator does not care whether
//! it is sleeping through a grace window or actively probing:
//! - [`delay::FixedDelay`]: wait a fixed grace window.
//! - [`tcp::TcpProbe`]: poll a TCP connect with backoff until a deadline.
//! - [`stdout::StdoutProbe`]: wait for a matching line on the service stdout.
//!
//! Every probe returns early with `NotReady` if the service exits while we
//! are waiting on it.

use crate::config::ReadinessSpec;
use crate::exec::{BackgroundProcess, BoxFuture};

pub mod delay;
pub mod stdout;
pub mod tcp;

pub use delay::FixedDelay;
pub use stdout::StdoutProbe;
pub use tcp::TcpProbe;

/// Result of a readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(String),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

pub trait ReadinessProbe: Send + Sync {
    /// Short human description for logs and `--dry-run`.
    fn describe(&self) -> String;

    /// Wait until the service is usable or the probe gives up.
    fn await_ready<'a>(&'a self, process: &'a mut BackgroundProcess) -> BoxFuture<'a, Readiness>;
}

/// Build the probe configured for the service.
pub fn probe_for(spec: &ReadinessSpec) -> Box<dyn ReadinessProbe> {
    match spec {
        ReadinessSpec::Delay { grace } => Box::new(FixedDelay::new(*grace)),
        ReadinessSpec::Tcp {
            address,
            timeout,
            interval,
        } => Box::new(TcpProbe::new(address.clone(), *timeout, *interval)),
        ReadinessSpec::Stdout { pattern, timeout } => {
            Box::new(StdoutProbe::new(pattern.clone(), *timeout))
        }
    }
}

fn exited_early(code: i32) -> Readiness {
    Readiness::NotReady(format!("service exited with status {code} before becoming ready"))
}
