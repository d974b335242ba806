//! Top-level assessment orchestrator.
//!
//! One `tokio::spawn` per concurrent unit of work, collected and awaited
//! together, bounded here by `|participants|` per task rather than by a
//! fixed worker pool.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, info_span, Instrument};

use crate::artifact::ArtifactBuilder;
use crate::catalog::GoldTaskCatalog;
use crate::classifier::{ClassifierInput, ErrorClassification, ErrorClassifier};
use crate::comparator::{ComparatorConfig, ResultComparator};
use crate::execution::ExecutionAdapter;
use crate::resilience::{CandidateRequest, OperationType, ResilientClient};
use crate::scorer::Scorer;
use crate::types::{
    AssessmentConfig, ExecutionResult, GoldTask, RawAssessmentConfig, TaskResult, TaskUpdate,
};

const PROGRESS_FLOOR: f64 = 0.10;
const PROGRESS_SPAN: f64 = 0.85;
const PROGRESS_PRE_ARTIFACT: f64 = 0.95;

pub struct Orchestrator {
    catalog: Arc<GoldTaskCatalog>,
    adapter: Arc<dyn ExecutionAdapter>,
    client: Arc<ResilientClient>,
}

impl Orchestrator {
    pub fn new(catalog: Arc<GoldTaskCatalog>, adapter: Arc<dyn ExecutionAdapter>, client: Arc<ResilientClient>) -> Self {
        Self { catalog, adapter, client }
    }

    /// Runs one assessment, returning a stream of `TaskUpdate`s. The
    /// terminal update is always `completed` or `failed`.
    pub fn assess(
        self: Arc<Self>,
        participants: HashMap<String, String>,
        raw_config: RawAssessmentConfig,
    ) -> ReceiverStream<TaskUpdate> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            self.run(participants, raw_config, tx).await;
        });
        ReceiverStream::new(rx)
    }

    async fn run(
        &self,
        participants: HashMap<String, String>,
        raw_config: RawAssessmentConfig,
        tx: mpsc::Sender<TaskUpdate>,
    ) {
        let assessment_id = short_id();
        let span = info_span!("assessment", assessment_id = %assessment_id);
        self.run_inner(assessment_id, participants, raw_config, tx)
            .instrument(span)
            .await;
    }

    async fn run_inner(
        &self,
        assessment_id: String,
        participants: HashMap<String, String>,
        raw_config: RawAssessmentConfig,
        tx: mpsc::Sender<TaskUpdate>,
    ) {
        let _ = tx.send(TaskUpdate::submitted("assessment accepted")).await;

        if participants.is_empty() {
            let _ = tx
                .send(TaskUpdate::failed("configuration error: no participants supplied"))
                .await;
            return;
        }

        let config = match raw_config.into_config() {
            Ok(config) => config,
            Err(err) => {
                let _ = tx.send(TaskUpdate::failed(format!("configuration error: {err}"))).await;
                return;
            }
        };

        let tasks: Vec<GoldTask> = self.catalog.filter(&config).into_iter().cloned().collect();
        if tasks.is_empty() {
            let _ = tx.send(TaskUpdate::failed("no gold tasks matched the requested filters")).await;
            return;
        }

        let schema = match self.adapter.get_schema().await {
            Ok(schema) => schema,
            Err(err) => {
                let _ = tx
                    .send(TaskUpdate::failed(format!("failed to snapshot reference schema: {err}")))
                    .await;
                return;
            }
        };
        let schema_json = serde_json::to_value(&schema).unwrap_or(json!({}));

        let comparator = ResultComparator::new(ComparatorConfig::default());
        let scorer = Scorer::new(config.scorer_preset.into());
        let classifier = ErrorClassifier::new();

        let mut accumulator: HashMap<String, Vec<TaskResult>> =
            participants.keys().map(|id| (id.clone(), Vec::new())).collect();

        let total_evaluations = tasks.len() * participants.len();
        let mut evaluations_done = 0usize;

        for task in &tasks {
            let payload = CandidateRequest {
                task_id: task.id.clone(),
                question: task.question.clone(),
                schema: schema_json.clone(),
                dialect: format!("{:?}", config.dialect).to_lowercase(),
            };

            let responses = if config.parallel_evaluation {
                self.dispatch_parallel(&participants, &payload).await
            } else {
                self.dispatch_sequential(&participants, &payload).await
            };

            for (candidate_id, dispatch_result) in responses {
                let task_result = match dispatch_result {
                    Ok(response) if !response.sql.trim().is_empty() => {
                        self.evaluate(task, &response.sql, &comparator, &scorer, &classifier).await
                    }
                    Ok(response) => {
                        let message = response.error.unwrap_or_else(|| "candidate returned empty sql".to_string());
                        self.synthesize_failure(task, "", &message, &scorer, &classifier)
                    }
                    Err(err) => self.synthesize_failure(task, "", &err.to_string(), &scorer, &classifier),
                };

                accumulator.entry(candidate_id.clone()).or_default().push(task_result);

                evaluations_done += 1;
                let progress = PROGRESS_FLOOR + PROGRESS_SPAN * (evaluations_done as f64 / total_evaluations as f64);
                let _ = tx
                    .send(TaskUpdate::working(
                        format!("evaluated task '{}' for candidate '{}'", task.id, candidate_id),
                        progress,
                    ))
                    .await;
            }
        }

        let _ = tx
            .send(TaskUpdate::working("building assessment artifact", PROGRESS_PRE_ARTIFACT))
            .await;

        let artifact = ArtifactBuilder::build(assessment_id.clone(), &participants, accumulator, config.same_tasks);
        info!(assessment_id = %assessment_id, "assessment complete");
        let _ = tx.send(TaskUpdate::completed("assessment complete", artifact)).await;
    }

    async fn dispatch_parallel(
        &self,
        participants: &HashMap<String, String>,
        payload: &CandidateRequest,
    ) -> Vec<(String, Result<crate::resilience::CandidateResponse, crate::resilience::ResilientClientError>)> {
        let mut handles = Vec::with_capacity(participants.len());
        for (candidate_id, endpoint) in participants {
            let client = self.client.clone();
            let candidate_id = candidate_id.clone();
            let endpoint = endpoint.clone();
            let payload = payload.clone();
            let handle = tokio::spawn(async move {
                client.dispatch(&endpoint, OperationType::SqlGeneration, &payload).await
            });
            handles.push((candidate_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (candidate_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(crate::resilience::ResilientClientError::InvalidUrl(join_err.to_string())),
            };
            results.push((candidate_id, result));
        }
        results
    }

    async fn dispatch_sequential(
        &self,
        participants: &HashMap<String, String>,
        payload: &CandidateRequest,
    ) -> Vec<(String, Result<crate::resilience::CandidateResponse, crate::resilience::ResilientClientError>)> {
        let mut results = Vec::with_capacity(participants.len());
        for (candidate_id, endpoint) in participants {
            let result = self.client.dispatch(endpoint, OperationType::SqlGeneration, payload).await;
            results.push((candidate_id.clone(), result));
        }
        results
    }

    async fn evaluate(
        &self,
        task: &GoldTask,
        sql: &str,
        comparator: &ResultComparator,
        scorer: &Scorer,
        classifier: &ErrorClassifier,
    ) -> TaskResult {
        let execution = self.adapter.execute(sql).await;

        let comparison = task
            .expected_results
            .as_ref()
            .map(|expected| comparator.compare(&execution.rows, expected));

        let score = scorer.score(comparison.as_ref(), &execution);

        let classification = classifier.classify(&ClassifierInput {
            submitted_sql: sql,
            gold_sql: task.gold_sql.as_deref(),
            execution_success: execution.success,
            validation_errors: &execution.validation_errors,
            phantom_tables: &execution.phantom_tables,
            phantom_columns: &execution.phantom_columns,
            error_message: execution.error.as_deref(),
            match_score: comparison.as_ref().map(|c| c.match_score),
        });

        TaskResult {
            task_id: task.id.clone(),
            question: task.question.clone(),
            submitted_sql: sql.to_string(),
            gold_sql: task.gold_sql.clone(),
            execution,
            comparison,
            score,
            classification,
        }
    }

    fn synthesize_failure(
        &self,
        task: &GoldTask,
        sql: &str,
        message: &str,
        scorer: &Scorer,
        classifier: &ErrorClassifier,
    ) -> TaskResult {
        let execution = ExecutionResult::failed(message);
        let classification: ErrorClassification = classifier.classify(&ClassifierInput {
            submitted_sql: sql,
            gold_sql: task.gold_sql.as_deref(),
            execution_success: false,
            validation_errors: &[],
            phantom_tables: &[],
            phantom_columns: &[],
            error_message: Some(message),
            match_score: None,
        });

        TaskResult {
            task_id: task.id.clone(),
            question: task.question.clone(),
            submitted_sql: sql.to_string(),
            gold_sql: task.gold_sql.clone(),
            execution,
            comparison: None,
            score: scorer.zero(),
            classification,
        }
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
