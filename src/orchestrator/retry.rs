//! Bounded retry for bridge calls
//!
//! Every attempt runs under its own timeout. An attempt that runs out of time
//! fails with the caller's dependency error, so exhaustion always surfaces as
//! the failing operation's own error. Only errors that report themselves
//! retryable are tried again; validation and economic errors surface on the
//! first attempt.

use crate::config::RetryConfig;
use crate::error::{OrchestratorError, OrchestratorResult};

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            backoff_coefficient: config.backoff_coefficient,
            max_interval: Duration::from_millis(config.max_interval_ms),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), capped at `max_interval`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_coefficient
            .max(1.0)
            .powi(retry.saturating_sub(1) as i32);
        let millis = (self.initial_interval.as_millis() as f64 * factor)
            .min(self.max_interval.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Run `activity` until it succeeds, fails terminally, or the policy runs out.
/// `on_timeout` builds the error for an attempt that exceeds `attempt_timeout`.
pub async fn run_activity<T, F, Fut>(
    policy: &RetryPolicy,
    attempt_timeout: Duration,
    operation: &str,
    on_timeout: fn(String) -> OrchestratorError,
    mut activity: F,
) -> OrchestratorResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = OrchestratorResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;

        let error = match timeout(attempt_timeout, activity()).await {
            Ok(Ok(value)) => {
                if attempts > 1 {
                    debug!("{} succeeded (attempt {}/{})", operation, attempts, max_attempts);
                }
                return Ok(value);
            }
            Ok(Err(e)) => e,
            Err(_) => on_timeout(format!(
                "{} timed out after {:?}",
                operation, attempt_timeout
            )),
        };

        if !error.is_retryable() {
            return Err(error);
        }
        if attempts >= max_attempts {
            warn!(
                "{} gave up after {} attempts: {}",
                operation, attempts, error
            );
            return Err(error);
        }

        let delay = policy.delay_for(attempts);
        warn!(
            "{} failed (attempt {}/{}), retrying in {:?}: {}",
            operation, attempts, max_attempts, delay, error
        );
        crate::metrics::record_activity_retry(operation);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_millis(5),
            max_attempts,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = run_activity(
            &fast_policy(5),
            Duration::from_secs(1),
            "wrap",
            OrchestratorError::WrapFailed,
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(OrchestratorError::WrapFailed("flaky".into()))
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: OrchestratorResult<()> = run_activity(
            &fast_policy(5),
            Duration::from_secs(1),
            "swap",
            OrchestratorError::SwapFailed,
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OrchestratorError::InsufficientAmount("dust".into()))
                }
            },
        )
        .await;

        assert!(matches!(result, Err(OrchestratorError::InsufficientAmount(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: OrchestratorResult<()> = run_activity(
            &fast_policy(3),
            Duration::from_secs(1),
            "transfer",
            OrchestratorError::TransferFailed,
            || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    Err(OrchestratorError::TransferFailed(format!("attempt {}", n + 1)))
                }
            },
        )
        .await;

        assert_eq!(
            result,
            Err(OrchestratorError::TransferFailed("attempt 3".into()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_timeout_surfaces_operation_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: OrchestratorResult<()> = run_activity(
            &fast_policy(2),
            Duration::from_millis(10),
            "unwrap",
            OrchestratorError::UnwrapFailed,
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), "unwrap_failed");
        assert!(err.to_string().contains("unwrap timed out"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_attempt_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = run_activity(
            &fast_policy(3),
            Duration::from_millis(20),
            "fee_estimate",
            OrchestratorError::FeeEstimateFailed,
            || {
                let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
                async move {
                    if first {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok(7)
                }
            },
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
