// src/readiness/delay.rs

use std::time::Duration;

use tokio::time::sleep_until;
use tracing::debug;

use super::{exited_early, Readiness, ReadinessProbe};
use crate::exec::{BackgroundProcess, BoxFuture};

/// Sleep through a grace window and assume the service is up afterwards.
///
/// This is a proxy, not a check: the only failure it can observe is the
/// service dying during the window. The window ends at the process's
/// readiness deadline, which `start_service` sets from the same grace.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    grace: Duration,
}

impl FixedDelay {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

impl ReadinessProbe for FixedDelay {
    fn describe(&self) -> String {
        format!("fixed delay of {:?}", self.grace)
    }

    fn await_ready<'a>(&'a self, process: &'a mut BackgroundProcess) -> BoxFuture<'a, Readiness> {
        Box::pin(async move {
            let deadline = process.readiness_deadline();
            debug!(service = %process.name(), grace = ?self.grace, "waiting out readiness grace window");

            tokio::select! {
                _ = sleep_until(deadline) => Readiness::Ready,
                code = process.exited() => exited_early(code),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waits_at_least_the_grace_window() {
        let grace = Duration::from_millis(150);
        let started = std::time::Instant::now();
        let mut process = BackgroundProcess::detached("store", grace);
        let probe = FixedDelay::new(grace);

        let readiness = probe.await_ready(&mut process).await;
        let elapsed = started.elapsed();

        assert_eq!(readiness, Readiness::Ready);
        assert!(elapsed >= grace, "returned after {elapsed:?}, before {grace:?}");
        assert!(
            elapsed < grace + Duration::from_millis(150),
            "blocked for {elapsed:?}, well past {grace:?}"
        );
    }

    #[tokio::test]
    async fn window_is_counted_from_service_start() {
        let grace = Duration::from_millis(200);
        let mut process = BackgroundProcess::detached("store", grace);
        tokio::time::sleep(Duration::from_millis(150)).await;

        let started = std::time::Instant::now();
        let readiness = FixedDelay::new(grace).await_ready(&mut process).await;

        assert_eq!(readiness, Readiness::Ready);
        assert!(
            started.elapsed() < Duration::from_millis(150),
            "waited {:?} after the service had already used most of its window",
            started.elapsed()
        );
    }
}
