//! Core error taxonomy.
//!
//! Mirrors the boundary error categories of the assessment core. This is
//! deliberately separate from `classifier::ErrorClassification`, which is a
//! reporting-only taxonomy over *candidate* SQL failures, not over failures
//! of the core itself.

use thiserror::Error;

/// Errors that can terminate an assessment or a single dispatch.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no gold tasks matched the assessment filter")]
    NoMatchingTasks,

    #[error("dispatch to candidate '{candidate_id}' failed: {source}")]
    RemoteDispatch {
        candidate_id: String,
        #[source]
        source: crate::resilience::client::ResilientClientError,
    },

    #[error("sql execution error: {0}")]
    Execution(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
