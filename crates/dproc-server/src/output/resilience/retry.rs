//! Retry with exponential backoff.
//!
//! Delays double from the base delay (1s, 2s, 4s, ...) and are capped by
//! `max_delay`. Sleeping goes through `tokio::time`, so paused-clock tests
//! observe exact delays.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
}

#[derive(Debug)]
pub struct RetryResult<T, E> {
    pub result: Result<T, E>,
    /// Attempts made, 1 when the first one succeeded.
    pub attempts: u32,
    /// Time spent sleeping between attempts.
    pub total_delay: Duration,
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Delay before retry number `attempt + 1` (zero-based).
pub fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    config
        .base_delay
        .checked_mul(factor)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts. `operation` receives the zero-based attempt number.
pub async fn execute_with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let mut total_delay = Duration::ZERO;
    let mut attempt = 0;

    loop {
        let result = operation(attempt).await;
        attempt += 1;

        match result {
            Err(e) if attempt < config.max_attempts && is_retryable(&e) => {
                let delay = calculate_delay(config, attempt - 1);
                tokio::time::sleep(delay).await;
                total_delay += delay;
            },
            result => {
                return RetryResult {
                    result,
                    attempts: attempt,
                    total_delay,
                    total_duration: start.elapsed(),
                };
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_and_cap() {
        let config = RetryConfig::default().with_max_delay(Duration::from_secs(5));
        assert_eq!(calculate_delay(&config, 0), Duration::from_secs(1));
        assert_eq!(calculate_delay(&config, 1), Duration::from_secs(2));
        assert_eq!(calculate_delay(&config, 2), Duration::from_secs(4));
        assert_eq!(calculate_delay(&config, 3), Duration::from_secs(5));
        assert_eq!(calculate_delay(&config, 40), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_one_plus_two_seconds() {
        let started = Instant::now();
        let outcome = execute_with_retry(&RetryConfig::default(), |_| true, |attempt| async move {
            if attempt < 2 {
                Err("unavailable")
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.total_delay, Duration::from_secs(3));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let outcome: RetryResult<(), &str> =
            execute_with_retry(&RetryConfig::default(), |e| *e != "too large", |_| async {
                Err("too large")
            })
            .await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.total_delay, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let config = RetryConfig::default().with_max_attempts(4);
        let outcome: RetryResult<(), &str> =
            execute_with_retry(&config, |_| true, |_| async { Err("down") }).await;
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.result, Err("down"));
        assert_eq!(outcome.total_delay, Duration::from_secs(1 + 2 + 4));
    }
}
