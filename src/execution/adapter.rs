//! Execution adapter abstraction.
//!
//! A pool-holding, `anyhow::Context`-propagating shape generalized behind
//! a trait so the orchestrator does not care which reference database
//! backs an assessment run.

use async_trait::async_trait;

use super::schema::SchemaSnapshot;
use crate::types::ExecutionResult;

#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// Runs `sql` against the reference database and reports rows,
    /// timing, validation diagnostics, and any phantom tables/columns
    /// referenced.
    async fn execute(&self, sql: &str) -> ExecutionResult;

    /// Returns the cached schema snapshot, fetching it on first use.
    async fn get_schema(&self) -> anyhow::Result<SchemaSnapshot>;

    /// Forces the next `get_schema()` call to re-fetch from the database.
    async fn refresh_schema(&self);
}
