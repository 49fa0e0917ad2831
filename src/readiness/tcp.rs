// src/readiness/tcp.rs

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use super::{exited_early, Readiness, ReadinessProbe};
use crate::exec::{BackgroundProcess, BoxFuture};

const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Poll a TCP connect to `address` until it succeeds or the service's
/// readiness deadline (`timeout` after it started) passes.
/// The delay between attempts starts at `interval` and doubles up to 1s.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
    interval: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration, interval: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            interval,
        }
    }

    async fn poll(&self, deadline: Instant) -> Readiness {
        let mut delay = self.interval;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, TcpStream::connect(self.address.as_str())).await {
                Ok(Ok(_stream)) => {
                    debug!(address = %self.address, attempts, "service accepted a connection");
                    return Readiness::Ready;
                }
                Ok(Err(e)) => {
                    debug!(address = %self.address, attempts, error = %e, "service not accepting connections yet");
                }
                Err(_) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Readiness::NotReady(format!(
                    "{} not accepting connections after {:?} ({attempts} attempts)",
                    self.address, self.timeout
                ));
            }
            sleep(delay.min(deadline - now)).await;
            delay = (delay * 2).min(MAX_BACKOFF);
        }
    }
}

impl ReadinessProbe for TcpProbe {
    fn describe(&self) -> String {
        format!("tcp connect to {} within {:?}", self.address, self.timeout)
    }

    fn await_ready<'a>(&'a self, process: &'a mut BackgroundProcess) -> BoxFuture<'a, Readiness> {
        Box::pin(async move {
            let deadline = process.readiness_deadline();
            tokio::select! {
                readiness = self.poll(deadline) => readiness,
                code = process.exited() => exited_early(code),
            }
        })
    }
}
