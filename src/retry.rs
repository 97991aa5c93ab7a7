use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::RpcError;
use crate::logging::{ErrorLogger, LogContext, PerformanceMonitor};

/// Errors that know whether retrying the failed operation can help
pub trait Retryable {
    fn is_recoverable(&self) -> bool;

    /// Minimum wait the failing side asked for before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for RpcError {
    fn is_recoverable(&self) -> bool {
        RpcError::is_recoverable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RpcError::RateLimit { seconds } => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a configuration for RPC operations
    pub fn for_rpc() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay_ms as f64;
        let exponential_delay =
            base_delay * self.backoff_multiplier.powi(attempt.saturating_sub(1).min(62) as i32);

        let capped_delay = exponential_delay.min(self.max_delay_ms as f64);

        let final_delay = if self.jitter {
            let jitter_factor = 0.1; // 10% jitter
            let jitter = capped_delay * jitter_factor * (rand::random::<f64>() - 0.5);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Backoff delay raised to the server's requested wait, never past `max_delay_ms`
    pub fn delay_with_hint(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        match retry_after {
            Some(hint) => delay.max(hint.min(Duration::from_millis(self.max_delay_ms))),
            None => delay,
        }
    }
}

/// Retry mechanism with exponential backoff and jitter
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    /// Execute an operation with retry logic.
    ///
    /// Non-recoverable errors are returned immediately.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        E: Retryable + Display + Debug,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let monitor = PerformanceMonitor::new(&format!("retry_{}", self.operation_name));
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        ErrorLogger::log_recovery_success(&self.operation_name, attempt, monitor.elapsed_ms());
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_recoverable() {
                        LogContext::new("retry", &self.operation_name)
                            .with_retry_count(attempt)
                            .with_metadata("reason", serde_json::json!("non_recoverable"))
                            .debug(&format!("Non-recoverable error, aborting retries: {}", error));
                        return Err(error);
                    }

                    if max_attempts > 1 {
                        ErrorLogger::log_recovery_attempt(&self.operation_name, &error, attempt, max_attempts);
                    }

                    if attempt >= max_attempts {
                        return Err(error);
                    }

                    let delay = self.config.delay_with_hint(attempt, error.retry_after());
                    LogContext::new("retry", &self.operation_name)
                        .with_retry_count(attempt)
                        .with_metadata("delay_ms", serde_json::json!(delay.as_millis() as u64))
                        .debug(&format!(
                            "Retrying in {}ms (attempt {} of {})",
                            delay.as_millis(),
                            attempt,
                            max_attempts
                        ));

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Convenience functions for common retry patterns
pub struct RetryUtils;

impl RetryUtils {
    /// Retry an RPC operation with the given configuration
    pub async fn retry_rpc<T, F, Fut>(
        operation_name: &str,
        config: &RetryConfig,
        operation: F,
    ) -> Result<T, RpcError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        RetryManager::new(operation_name, config.clone())
            .execute(operation)
            .await
    }
}

/// Idle delay between poll cycles.
///
/// Successful cycles wait the fixed poll interval. Consecutive failures back
/// off exponentially from the retry delay up to the configured maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
    poll_interval: Duration,
    failure_config: RetryConfig,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(poll_interval: Duration, retry_delay: Duration, max_retry_delay: Duration) -> Self {
        Self {
            poll_interval,
            failure_config: RetryConfig {
                max_attempts: u32::MAX,
                initial_delay_ms: retry_delay.as_millis() as u64,
                max_delay_ms: max_retry_delay.as_millis() as u64,
                backoff_multiplier: 2.0,
                jitter: false,
            },
            consecutive_failures: 0,
        }
    }

    /// Record a successful cycle and return the delay before the next one
    pub fn on_success(&mut self) -> Duration {
        self.consecutive_failures = 0;
        self.poll_interval
    }

    /// Record a failed cycle and return the delay before retrying
    pub fn on_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.failure_config.delay_for_attempt(self.consecutive_failures)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_delay_is_exponential_and_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(1_000));
        assert_eq!(config.delay_for_attempt(30), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = RetryConfig {
            jitter: true,
            ..fast_config(3)
        };
        let config = RetryConfig {
            initial_delay_ms: 1_000,
            max_delay_ms: 1_000,
            ..config
        };

        for _ in 0..50 {
            let delay = config.delay_for_attempt(1).as_millis();
            assert!((950..=1_050).contains(&delay), "delay out of range: {}", delay);
        }
    }

    #[test]
    fn test_rate_limit_wait_is_honored_up_to_the_cap() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };

        let hint = RpcError::RateLimit { seconds: 2 }.retry_after();
        assert_eq!(hint, Some(Duration::from_secs(2)));
        assert_eq!(config.delay_with_hint(1, hint), Duration::from_secs(2));

        let long_hint = RpcError::RateLimit { seconds: 60 }.retry_after();
        assert_eq!(config.delay_with_hint(1, long_hint), Duration::from_millis(5_000));

        // a hint shorter than the backoff does not shorten it
        assert_eq!(
            config.delay_with_hint(3, Some(Duration::from_millis(10))),
            Duration::from_millis(400)
        );
        assert_eq!(RpcError::Timeout { seconds: 1 }.retry_after(), None);
        assert_eq!(config.delay_with_hint(2, None), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_rate_limited_retry_waits_for_requested_time() {
        let calls = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            max_delay_ms: 300,
            ..fast_config(2)
        };
        let manager = RetryManager::new("rate_limited", config);

        let started = std::time::Instant::now();
        let result = manager
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(RpcError::RateLimit { seconds: 1 })
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(300), "waited only {:?}", waited);
        assert!(waited < Duration::from_secs(1), "cap ignored: {:?}", waited);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let manager = RetryManager::new("flaky", fast_config(3));

        let result = manager
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(RpcError::Connection("refused".to_string()))
                    } else {
                        Ok(7u64)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u64, RpcError> = RetryUtils::retry_rpc("down", &fast_config(2), || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RpcError::Timeout { seconds: 1 })
            }
        })
        .await;

        assert!(matches!(result, Err(RpcError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_recoverable_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let manager = RetryManager::new("bad_request", fast_config(5));

        let result: Result<(), RpcError> = manager
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(RpcError::InvalidResponse("not a string".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows_on_failure_and_resets_on_success() {
        let mut backoff = Backoff::new(
            Duration::from_millis(2_000),
            Duration::from_millis(500),
            Duration::from_millis(3_000),
        );

        assert_eq!(backoff.on_failure(), Duration::from_millis(500));
        assert_eq!(backoff.on_failure(), Duration::from_millis(1_000));
        assert_eq!(backoff.on_failure(), Duration::from_millis(2_000));
        assert_eq!(backoff.on_failure(), Duration::from_millis(3_000));
        assert_eq!(backoff.on_failure(), Duration::from_millis(3_000));
        assert_eq!(backoff.consecutive_failures(), 5);

        assert_eq!(backoff.on_success(), Duration::from_millis(2_000));
        assert_eq!(backoff.consecutive_failures(), 0);
        assert_eq!(backoff.on_failure(), Duration::from_millis(500));
    }
}
