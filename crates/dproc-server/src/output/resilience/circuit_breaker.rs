//! Circuit breaker shared by every batch sent to one destination.
//!
//! After `failure_threshold` consecutive failures the breaker opens and
//! writes are rejected without reaching the sink. Once `reset_timeout` has
//! elapsed one trial write is let through (half-open); its result closes or
//! re-opens the breaker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    changed_at: Instant,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    rejected: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                changed_at: Instant::now(),
            }),
            rejected: AtomicU64::new(0),
        }
    }

    // State updates are single assignments, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a write may reach the sink now.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open if inner.changed_at.elapsed() >= self.config.reset_timeout => {
                inner.state = CircuitState::HalfOpen;
                inner.changed_at = Instant::now();
                info!(destination = %self.name, "Circuit half-open, allowing a trial write");
                true
            },
            CircuitState::Open => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                false
            },
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if inner.state != CircuitState::Closed {
            inner.state = CircuitState::Closed;
            inner.changed_at = Instant::now();
            info!(destination = %self.name, "Circuit closed");
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let trip = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            inner.state = CircuitState::Open;
            inner.changed_at = Instant::now();
            warn!(
                destination = %self.name,
                failures = inner.consecutive_failures,
                cool_down_secs = self.config.reset_timeout.as_secs(),
                "Circuit opened"
            );
        }
    }

    pub fn current_state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Writes rejected while open.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// One breaker per destination id, created on first use.
#[derive(Debug, Default)]
pub struct CircuitBreakerManager {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn get_or_create(&self, destination_id: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(
            breakers
                .entry(destination_id.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(destination_id, self.config))),
        )
    }

    /// `(destination id, state, consecutive failures)` for every breaker.
    pub fn snapshot(&self) -> Vec<(String, CircuitState, u32)> {
        let breakers = self.breakers.lock().unwrap_or_else(|p| p.into_inner());
        let mut all: Vec<_> = breakers
            .iter()
            .map(|(id, b)| (id.clone(), b.current_state(), b.consecutive_failures()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("d1", CircuitBreakerConfig::default())
    }

    #[test]
    fn test_starts_closed() {
        let cb = breaker();
        assert_eq!(cb.current_state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn test_opens_after_threshold_consecutive_failures() {
        let cb = breaker();
        for _ in 0..4 {
            cb.record_failure();
        }
        assert_eq!(cb.current_state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);
        assert!(!cb.allow_request());
        assert_eq!(cb.rejected_count(), 1);
    }

    #[test]
    fn test_success_resets_the_count() {
        let cb = breaker();
        for _ in 0..4 {
            cb.record_failure();
        }
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_cool_down() {
        let cb = CircuitBreaker::new(
            "d1",
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_reset_timeout(Duration::from_secs(30)),
        );
        cb.record_failure();
        assert!(!cb.allow_request());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(cb.allow_request());
        assert_eq!(cb.current_state(), CircuitState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(cb.allow_request());
        cb.record_success();
        assert_eq!(cb.current_state(), CircuitState::Closed);
    }

    #[test]
    fn test_manager_shares_breakers_per_destination() {
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig::default().with_failure_threshold(1));
        manager.get_or_create("a").record_failure();
        assert_eq!(manager.get_or_create("a").current_state(), CircuitState::Open);
        assert_eq!(manager.get_or_create("b").current_state(), CircuitState::Closed);
        assert_eq!(manager.snapshot().len(), 2);
    }
}
