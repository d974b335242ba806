//! Per-host circuit breaker.
//!
//! Three-state machine (closed/open/half-open) backed by atomics and an
//! `RwLock<Instant>` next-attempt clock, with failure_threshold=3 and
//! reset_timeout=30s. Keyed per-host since one resilient client talks to
//! many candidate hosts.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u64,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Error returned when the breaker is open; never retried by the caller.
#[derive(Debug, thiserror::Error)]
#[error("circuit open for host '{host}'")]
pub struct CircuitOpenError {
    pub host: String,
}

/// A single host's breaker. The clock is `tokio::time::Instant`, a
/// monotonic clock, so wall-clock adjustments cannot reopen or close it
/// spuriously.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU64,
    next_attempt: Arc<RwLock<Instant>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(0),
            failure_count: AtomicU64::new(0),
            next_attempt: Arc::new(RwLock::new(Instant::now())),
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::Acquire) {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Checks whether a request may proceed, transitioning `open ->
    /// half_open` if the reset timeout has elapsed. Returns `Err` with the
    /// host name if the request must fail fast.
    pub async fn try_acquire(&self, host: &str) -> Result<(), CircuitOpenError> {
        if self.state() == CircuitState::Open {
            let next_attempt = *self.next_attempt.read().await;
            if Instant::now() < next_attempt {
                return Err(CircuitOpenError {
                    host: host.to_string(),
                });
            }
            self.state.store(2, Ordering::Release); // HalfOpen: allow one test request
            info!(host, "circuit breaker transitioning to half-open");
        }
        Ok(())
    }

    pub async fn on_success(&self, host: &str) {
        let was_half_open = self.state() == CircuitState::HalfOpen;
        self.failure_count.store(0, Ordering::Release);
        self.state.store(0, Ordering::Release);
        if was_half_open {
            info!(host, "circuit breaker closed after successful probe");
        }
    }

    pub async fn on_failure(&self, host: &str) {
        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        let was_half_open = self.state() == CircuitState::HalfOpen;

        if was_half_open || failures >= self.config.failure_threshold {
            self.state.store(1, Ordering::Release);
            let next_attempt = Instant::now() + self.config.reset_timeout;
            *self.next_attempt.write().await = next_attempt;
            warn!(host, failures, "circuit breaker opened");
        }
    }
}

/// Per-host registry of circuit breakers, shared by the resilient client
/// across concurrent in-flight requests.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<std::collections::HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub async fn get(&self, host: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().await.get(host) {
            return existing.clone();
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config)))
            .clone()
    }
}
