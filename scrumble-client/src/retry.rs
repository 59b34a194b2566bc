//! Retry with exponential backoff for matchup API calls
//!
//! Only transient errors (network, timeout, 5xx, 429) are retried. The whole
//! operation, backoff sleeps included, is bounded by the overall timeout.

use std::future::Future;
use std::time::{Duration, Instant};

use scrumble_common::config::RetryConfig;

use crate::api::ApiError;

/// Retry settings injected into the transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub overall_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: if config.multiplier.is_finite() && config.multiplier >= 1.0 {
                config.multiplier
            } else {
                1.0
            },
            overall_timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// One attempt, no backoff
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sleep before attempt `attempt + 1`, where `attempt` counts from 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Run `operation`, retrying transient failures
    ///
    /// # Arguments
    /// * `operation_name` - Name for logging (e.g., "/vote")
    /// * `operation` - Closure producing one attempt
    pub async fn run<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match tokio::time::timeout(self.overall_timeout, self.attempts(operation_name, operation)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation = operation_name,
                    timeout_ms = self.overall_timeout.as_millis() as u64,
                    "Operation timed out"
                );
                Err(ApiError::Timeout)
            }
        }
    }

    async fn attempts<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            if attempt > 1 {
                tracing::debug!(operation = operation_name, attempt, "Retrying request");
            }

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = start_time.elapsed().as_millis() as u64,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) if attempt >= self.max_attempts => {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Request failed: retries exhausted"
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            multiplier: 2.0,
            overall_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(1000),
            multiplier: 2.0,
            overall_timeout: Duration::from_secs(10),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(1000));
        assert_eq!(policy.backoff(4), Duration::from_millis(1000));
    }

    #[test]
    fn test_from_config_sanitizes() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 0,
            multiplier: 0.5,
            ..RetryConfig::default()
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.multiplier, 1.0);
    }

    #[tokio::test]
    async fn test_transient_errors_retried_up_to_max() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), ApiError> = fast(3)
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Status { status: 503, message: "busy".to_string() })
            })
            .await;
        assert!(matches!(result, Err(ApiError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = fast(3)
            .run("test", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ApiError::Network("reset".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_transient_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), ApiError> = fast(5)
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Conflict("duplicate".to_string()))
            })
            .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overall_timeout() {
        let policy = RetryPolicy {
            overall_timeout: Duration::from_millis(20),
            ..fast(3)
        };
        let result: Result<(), ApiError> = policy
            .run("test", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ApiError::Timeout)));
    }
}
