//! Write resilience: retry with exponential backoff and per-destination
//! circuit breakers.
//!
//! Both are independent of any particular destination; the dispatcher
//! composes them around handler writes.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitState};
pub use retry::{calculate_delay, execute_with_retry, RetryConfig, RetryResult};
