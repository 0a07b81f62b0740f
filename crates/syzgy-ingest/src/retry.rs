//! Bounded retry for batch inserts

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Backoff settings. `max_retries = 0` means fail on the first error.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Growth factor between delays, at least 1.0
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Same backoff, different retry budget
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Delay sequence for one operation
pub struct RetryPolicy {
    config: RetryConfig,
    current_attempt: usize,
    current_delay_ms: u64,
}

impl RetryPolicy {
    /// Fresh policy starting at `initial_delay_ms`
    pub fn new(config: RetryConfig) -> Self {
        Self {
            current_delay_ms: config.initial_delay_ms,
            current_attempt: 0,
            config,
        }
    }

    /// Delay before the next retry, or `None` once the budget is spent
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.config.max_retries {
            return None;
        }

        let delay = Duration::from_millis(self.current_delay_ms);
        self.current_attempt += 1;

        self.current_delay_ms = ((self.current_delay_ms as f64) * self.config.multiplier)
            .min(self.config.max_delay_ms as f64) as u64;

        Some(delay)
    }

    /// Retries handed out so far
    pub fn attempt(&self) -> usize {
        self.current_attempt
    }
}

/// Run `operation` until it succeeds, fails with an error `retryable`
/// rejects, or the retry budget is spent.
pub async fn with_retry<F, Fut, T, E, P>(
    mut operation: F,
    config: &RetryConfig,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut policy = RetryPolicy::new(config.clone());

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !retryable(&e) => return Err(e),
            Err(e) => {
                if let Some(delay) = policy.next_delay() {
                    warn!(
                        attempt = policy.attempt(),
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Insert failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    debug!(attempts = policy.attempt(), error = %e, "Insert failed after all retries");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn default_is_fail_fast() {
        let mut policy = RetryPolicy::new(RetryConfig::default());
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn retry_policy_delays_increase() {
        let config = RetryConfig {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            multiplier: 2.0,
        };

        let mut policy = RetryPolicy::new(config);

        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(100));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(200));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(400));
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn retry_policy_respects_max_delay() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 400,
            max_delay_ms: 1000,
            multiplier: 3.0,
        };

        let mut policy = RetryPolicy::new(config);
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(400));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(1000));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(1000));
    }

    fn quick(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Cell::new(0);
        let result: Result<u32, String> = with_retry(
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err("busy".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
            &quick(5),
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), String> = with_retry(
            || {
                calls.set(calls.get() + 1);
                async { Err("bad request".to_string()) }
            },
            &quick(5),
            |_| false,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
