//! Resilient HTTP client for candidate-agent dispatch.
//!
//! Combines adaptive per-operation timeouts, retry with backoff, and a
//! per-host circuit breaker: check circuit -> attempt with timeout ->
//! record outcome -> retry loop.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info_span, Instrument};

use super::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitOpenError};
use super::retry::{retry_with, RetryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    HealthCheck,
    SqlGeneration,
    SchemaFetch,
    Default,
}

impl OperationType {
    pub fn timeout(self) -> Duration {
        match self {
            OperationType::HealthCheck => Duration::from_secs(5),
            OperationType::SqlGeneration => Duration::from_secs(60),
            OperationType::SchemaFetch => Duration::from_secs(10),
            OperationType::Default => Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResilientClientError {
    #[error("request to '{url}' timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("transport error contacting '{url}': {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("http error {status} from '{url}': {body}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    #[error("invalid url '{0}'")]
    InvalidUrl(String),
}

impl ResilientClientError {
    fn is_retryable(&self) -> bool {
        match self {
            ResilientClientError::Timeout { .. } | ResilientClientError::Transport { .. } => true,
            ResilientClientError::HttpStatus { status, .. } => status.is_server_error(),
            ResilientClientError::CircuitOpen(_) | ResilientClientError::InvalidUrl(_) => false,
        }
    }
}

/// POST payload sent to a candidate agent.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateRequest {
    pub task_id: String,
    pub question: String,
    pub schema: serde_json::Value,
    pub dialect: String,
}

/// Expected candidate response shape.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateResponse {
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct ResilientClient {
    http: Client,
    retry_config: RetryConfig,
    breakers: CircuitBreakerRegistry,
}

impl ResilientClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            retry_config: RetryConfig::default(),
            breakers: CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
        }
    }

    pub async fn dispatch(
        &self,
        url: &str,
        operation_type: OperationType,
        payload: &CandidateRequest,
    ) -> Result<CandidateResponse, ResilientClientError> {
        let host = host_of(url)?;
        let breaker = self.breakers.get(&host).await;

        let span = info_span!("candidate_dispatch", host = %host, operation = ?operation_type);
        async {
            retry_with(
                self.retry_config,
                || async {
                    breaker.try_acquire(&host).await?;

                    let result = self.attempt(url, operation_type, payload).await;
                    match &result {
                        Ok(_) => breaker.on_success(&host).await,
                        Err(e) if e.is_retryable() || matches!(e, ResilientClientError::HttpStatus { .. }) => {
                            breaker.on_failure(&host).await
                        }
                        Err(_) => {}
                    }
                    result
                },
                |e| e.is_retryable(),
            )
            .await
        }
        .instrument(span)
        .await
    }

    async fn attempt(
        &self,
        url: &str,
        operation_type: OperationType,
        payload: &CandidateRequest,
    ) -> Result<CandidateResponse, ResilientClientError> {
        let send = self
            .http
            .post(url)
            .json(payload)
            .timeout(operation_type.timeout())
            .send();

        let response = match tokio::time::timeout(operation_type.timeout(), send).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => {
                return Err(ResilientClientError::Transport {
                    url: url.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ResilientClientError::Timeout {
                    url: url.to_string(),
                    timeout_secs: operation_type.timeout().as_secs(),
                })
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResilientClientError::HttpStatus {
                url: url.to_string(),
                status,
                body,
            });
        }

        response
            .json::<CandidateResponse>()
            .await
            .map_err(|source| ResilientClientError::Transport {
                url: url.to_string(),
                source,
            })
    }
}

impl Default for ResilientClient {
    fn default() -> Self {
        Self::new()
    }
}

fn host_of(url: &str) -> Result<String, ResilientClientError> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .ok_or_else(|| ResilientClientError::InvalidUrl(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_timeouts_match_spec() {
        assert_eq!(OperationType::HealthCheck.timeout(), Duration::from_secs(5));
        assert_eq!(OperationType::SqlGeneration.timeout(), Duration::from_secs(60));
        assert_eq!(OperationType::SchemaFetch.timeout(), Duration::from_secs(10));
        assert_eq!(OperationType::Default.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn http_4xx_is_not_retryable() {
        let err = ResilientClientError::HttpStatus {
            url: "http://x".to_string(),
            status: StatusCode::BAD_REQUEST,
            body: String::new(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn http_5xx_is_retryable() {
        let err = ResilientClientError::HttpStatus {
            url: "http://x".to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn circuit_open_is_not_retryable() {
        let err = ResilientClientError::CircuitOpen(CircuitOpenError {
            host: "host".to_string(),
        });
        assert!(!err.is_retryable());
    }
}
