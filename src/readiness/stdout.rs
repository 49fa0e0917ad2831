// src/readiness/stdout.rs

use std::time::Duration;

use regex::Regex;
use tokio::time::sleep_until;

use super::{exited_early, Readiness, ReadinessProbe};
use crate::exec::{BackgroundProcess, BoxFuture};

/// Wait for the service to print a line matching `pattern`.
///
/// Needs the service started with piped stdout; `start_service` does that
/// whenever the configured readiness mode is `stdout`.
#[derive(Debug, Clone)]
pub struct StdoutProbe {
    pattern: Regex,
    timeout: Duration,
}

impl StdoutProbe {
    pub fn new(pattern: Regex, timeout: Duration) -> Self {
        Self { pattern, timeout }
    }
}

impl ReadinessProbe for StdoutProbe {
    fn describe(&self) -> String {
        format!(
            "stdout line matching /{}/ within {:?}",
            self.pattern.as_str(),
            self.timeout
        )
    }

    fn await_ready<'a>(&'a self, process: &'a mut BackgroundProcess) -> BoxFuture<'a, Readiness> {
        Box::pin(async move {
            let Some(mut signal) = process.ready_signal() else {
                return Readiness::NotReady("service stdout is not being watched".to_string());
            };
            let deadline = process.readiness_deadline();

            tokio::select! {
                seen = signal.wait_for(|ready| *ready) => match seen {
                    Ok(_) => Readiness::Ready,
                    Err(_) => Readiness::NotReady(
                        "service closed stdout before printing its ready line".to_string(),
                    ),
                },
                _ = sleep_until(deadline) => Readiness::NotReady(format!(
                    "no stdout line matched /{}/ within {:?}",
                    self.pattern.as_str(),
                    self.timeout
                )),
                code = process.exited() => exited_early(code),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;
    use tokio::time::sleep;

    fn probe(timeout: Duration) -> StdoutProbe {
        StdoutProbe::new(Regex::new("ready").unwrap(), timeout)
    }

    #[tokio::test]
    async fn signal_flip_means_ready() {
        let (tx, rx) = watch::channel(false);
        let mut process =
            BackgroundProcess::detached("store", Duration::from_secs(1)).with_ready_signal(rx);

        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
            // Keep the sender alive past the flip.
            sleep(Duration::from_millis(200)).await;
        });

        assert_eq!(
            probe(Duration::from_secs(1)).await_ready(&mut process).await,
            Readiness::Ready
        );
    }

    #[tokio::test]
    async fn unwatched_stdout_is_not_ready() {
        let mut process = BackgroundProcess::detached("store", Duration::from_secs(1));
        let readiness = probe(Duration::from_secs(1)).await_ready(&mut process).await;
        assert!(!readiness.is_ready());
    }

    #[tokio::test]
    async fn silent_service_times_out() {
        let (_tx, rx) = watch::channel(false);
        let mut process =
            BackgroundProcess::detached("store", Duration::from_millis(50)).with_ready_signal(rx);

        let readiness = probe(Duration::from_millis(50)).await_ready(&mut process).await;
        assert!(matches!(readiness, Readiness::NotReady(ref msg) if msg.contains("within")));
    }
}
