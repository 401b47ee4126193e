//! Bounded retry with exponential backoff.
//!
//! [`with_retry`] knows nothing about profiles or sessions. It runs an async operation up to
//! `max_attempts` times, sleeping `base_delay * 2^(k-1)` after failed attempt `k`, and hands
//! back the last error untouched once attempts run out.
//!
//! Only read-only operations go through here. Issuing a key is never retried.

use std::{fmt::Display, future::Future, time::Duration};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt. Doubles after each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based) before the next one.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Executes `operation` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// Returns the first success immediately. No delay follows the final attempt, and the final
/// error is returned as-is so the caller can tell exhausted retries apart from other failures.
///
/// # Cancellation
///
/// Dropping the returned future stops further attempts. An attempt already handed to the
/// backend is not aborted by this function.
#[tracing::instrument(skip(policy, operation), fields(max_attempts = policy.max_attempts))]
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::debug!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %err,
                    "retries exhausted"
                );
                return Err(err);
            }
        }
    }
}
