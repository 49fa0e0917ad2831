// src/engine/retry.rs

//! Bounded per-stage retry for transient failures.

use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::engine::Stage;
use crate::exec::{CommandEnv, ProcessBackend, StageResult};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How many extra attempts a stage gets, and how long to wait between them.
///
/// Delay doubles after every attempt, capped at 30s. The default is no
/// retries: fail fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Delay before attempt `failed_attempt + 1` (1-based).
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

/// Run `stage` through `backend`, retrying transient failures within the
/// stage's policy. `SpawnFailure` is never retried.
pub async fn run_with_retry<B: ProcessBackend + ?Sized>(
    backend: &mut B,
    stage: &Stage,
    env: &CommandEnv,
) -> StageResult {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let mut result = backend.run_stage(stage, env).await;
        result.attempts = attempt;

        match result.failure() {
            Some(failure) if failure.is_transient() && attempt <= stage.retry.max_retries => {
                let delay = stage.retry.delay_after(attempt);
                warn!(
                    stage = %stage.name,
                    attempt,
                    max_retries = stage.retry.max_retries,
                    error = %failure,
                    ?delay,
                    "stage failed; retrying"
                );
                sleep(delay).await;
            }
            _ => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_secs(1));
        assert_eq!(policy.delay_after(3), Duration::from_secs(2));
        assert_eq!(policy.delay_after(10), MAX_RETRY_DELAY);
        assert_eq!(policy.delay_after(200), MAX_RETRY_DELAY);
    }

    #[test]
    fn default_is_fail_fast() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
