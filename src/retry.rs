use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// Retry decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Exponential backoff configuration with jitter so concurrent uploads that
/// hit the same transient failure don't retry in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Compute the delay for a given retry (0-indexed).
    ///
    /// Formula: `min(base_delay * 2^retry, max_delay) + random_jitter(0..base_delay)`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exp_delay = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(retry).unwrap_or(u64::MAX));
        let capped = exp_delay.min(self.max_delay_ms);
        let jitter = if self.base_delay_ms > 0 {
            rand::thread_rng().gen_range(0..self.base_delay_ms)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }

    /// Total number of attempts: the first one plus `max_retries`.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Retry an async operation with exponential backoff and jitter.
///
/// - `config`: retry configuration
/// - `classifier`: inspects an error and returns `Retry` or `Abort`
/// - `operation`: called with the 0-based attempt index, so each attempt can
///   shape its request differently
///
/// Returns the first `Ok` result, or the last error if retries are exhausted
/// or the classifier returns `Abort`.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: &RetryConfig,
    classifier: C,
    operation: F,
) -> Result<T, E>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let total_attempts = config.total_attempts();
    let mut attempt = 0;

    loop {
        let err = match operation(attempt).await {
            Ok(val) => return Ok(val),
            Err(e) => e,
        };
        if classifier(&err) == RetryAction::Abort || attempt + 1 >= total_attempts {
            return Err(err);
        }
        let delay = config.delay_for_retry(attempt);
        tracing::warn!(
            "Retryable error (attempt {}/{}), retrying in {}ms: {}",
            attempt + 1,
            total_attempts,
            delay.as_millis(),
            err
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn instant() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.total_attempts(), 3);
    }

    #[test]
    fn test_delay_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 200,
            max_delay_ms: 60_000,
        };
        let d = config.delay_for_retry(0).as_millis();
        assert!((200..400).contains(&d));
        let d = config.delay_for_retry(1).as_millis();
        assert!((400..600).contains(&d));
        let d = config.delay_for_retry(2).as_millis();
        assert!((800..1000).contains(&d));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay_ms: 500,
            max_delay_ms: 3_000,
        };
        let d = config.delay_for_retry(10).as_millis();
        assert!((3_000..3_500).contains(&d));
    }

    #[test]
    fn test_delay_zero_base() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 0,
            max_delay_ms: 60_000,
        };
        assert_eq!(config.delay_for_retry(0), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_retry_succeeds_first_try() {
        let result: Result<i32, String> =
            retry_with_backoff(&instant(), |_| RetryAction::Retry, |_| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_abort_on_non_retryable() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();
        let result: Result<i32, String> = retry_with_backoff(
            &instant(),
            |_| RetryAction::Abort,
            |_| {
                let cc = cc.clone();
                async move {
                    cc.fetch_add(1, Ordering::SeqCst);
                    Err("fatal".to_string())
                }
            },
        )
        .await;
        assert_eq!(result.unwrap_err(), "fatal");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_passes_attempt_index() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let result: Result<u32, String> = retry_with_backoff(
            &instant(),
            |_| RetryAction::Retry,
            |attempt| {
                let s = s.clone();
                async move {
                    s.lock().unwrap().push(attempt);
                    if attempt < 2 {
                        Err(format!("attempt {} failed", attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_retry_exhausted_returns_last_error() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 0,
            max_delay_ms: 0,
        };
        let result: Result<i32, String> = retry_with_backoff(
            &config,
            |_| RetryAction::Retry,
            |attempt| async move { Err(format!("failure {}", attempt)) },
        )
        .await;
        // 1 initial + 2 retries = 3 attempts, last index 2
        assert_eq!(result.unwrap_err(), "failure 2");
    }
}
