//! Resilience layer: adaptive timeouts, retry, and per-host circuit
//! breaking for candidate-agent dispatch.

pub mod circuit_breaker;
pub mod client;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitOpenError, CircuitState};
pub use client::{CandidateRequest, CandidateResponse, OperationType, ResilientClient, ResilientClientError};
pub use retry::{retry_with, RetryConfig};
