//! Evaluation engine for benchmarking SQL-generating remote agents.
//!
//! Ties together the gold task catalog, execution adapter, comparator,
//! scorer, error classifier, resilient client and orchestrator into a
//! single entry point.

pub mod artifact;
pub mod catalog;
pub mod classifier;
pub mod comparator;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod orchestrator;
pub mod resilience;
pub mod scorer;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

pub use error::{CoreError, CoreResult};

use catalog::GoldTaskCatalog;
use config::AppConfig;
use execution::{ExecutionAdapter, SqliteExecutionAdapter};
use orchestrator::Orchestrator;
use resilience::ResilientClient;
use types::{RawAssessmentConfig, TaskUpdate};

const BASIC_SCHEMA_FIXTURE: &str = include_str!("../fixtures/basic_schema.sql");
const ENTERPRISE_SCHEMA_FIXTURE: &str = include_str!("../fixtures/enterprise_schema.sql");

/// Top-level coordinator: owns the catalog, the per-schema execution
/// adapters, and the resilient client, and exposes `assess()` as the
/// single public entry point.
pub struct EvaluationEngine {
    catalog: Arc<GoldTaskCatalog>,
    basic_adapter: Arc<dyn ExecutionAdapter>,
    enterprise_adapter: Arc<dyn ExecutionAdapter>,
    client: Arc<ResilientClient>,
}

impl EvaluationEngine {
    pub async fn new() -> Result<Self, CoreError> {
        let app_config = AppConfig::load()?;
        info!(gold_tasks_path = %app_config.gold_tasks_path, "loading gold task catalog");
        let catalog = GoldTaskCatalog::load(&app_config.gold_tasks_path).await?;

        let basic_adapter = SqliteExecutionAdapter::open_in_memory(BASIC_SCHEMA_FIXTURE)
            .await
            .map_err(|e| CoreError::Execution(format!("initializing basic reference database: {e}")))?;
        let enterprise_adapter = SqliteExecutionAdapter::open_in_memory(ENTERPRISE_SCHEMA_FIXTURE)
            .await
            .map_err(|e| CoreError::Execution(format!("initializing enterprise reference database: {e}")))?;

        Ok(Self {
            catalog: Arc::new(catalog),
            basic_adapter: Arc::new(basic_adapter),
            enterprise_adapter: Arc::new(enterprise_adapter),
            client: Arc::new(ResilientClient::new()),
        })
    }

    /// Runs one assessment and returns the progress stream. The reference
    /// database is selected up front from the raw `schema` field; full
    /// validation still happens inside the orchestrator once the request
    /// reaches it.
    pub fn assess(
        &self,
        participants: HashMap<String, String>,
        raw_config: RawAssessmentConfig,
    ) -> ReceiverStream<TaskUpdate> {
        let adapter = match raw_config.schema.as_deref() {
            Some("enterprise") => self.enterprise_adapter.clone(),
            _ => self.basic_adapter.clone(),
        };

        let orchestrator = Arc::new(Orchestrator::new(self.catalog.clone(), adapter, self.client.clone()));
        orchestrator.assess(participants, raw_config)
    }
}
