//! Core data model.
//!
//! Data flows through these types in one direction:
//! `GoldTask` + candidate SQL -> `ExecutionResult` -> (`ComparisonResult`,
//! `MultiDimensionalScore`, `ErrorClassification`) -> `TaskResult` ->
//! `ParticipantSummary` -> `AssessmentArtifact`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::ErrorClassification;
use crate::error::CoreError;

/// A row is an ordered mapping of column name to value, matching the
/// reference executor's column order.
pub type Row = HashMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// A prepared natural-language question with an optional reference SQL and
/// expected result set, loaded once from the read-only gold task catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldTask {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub gold_sql: Option<String>,
    #[serde(default)]
    pub expected_results: Option<Vec<Row>>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerPreset {
    Default,
    Strict,
    Performance,
    Quality,
}

impl ScorerPreset {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Some(ScorerPreset::Default),
            "strict" => Some(ScorerPreset::Strict),
            "performance" => Some(ScorerPreset::Performance),
            "quality" => Some(ScorerPreset::Quality),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSelector {
    Basic,
    Enterprise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Duckdb,
    Postgresql,
}

impl Dialect {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Some(Dialect::Sqlite),
            "duckdb" => Some(Dialect::Duckdb),
            "postgresql" => Some(Dialect::Postgresql),
            _ => None,
        }
    }
}

/// Parsed, validated per-assessment configuration. Constructed from the raw
/// request map at the core boundary (see `AssessmentRequest`).
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    pub difficulties: HashSet<Difficulty>,
    pub task_count: usize,
    pub tags: HashSet<String>,
    pub schema: SchemaSelector,
    pub scorer_preset: ScorerPreset,
    pub dialect: Dialect,
    pub timeout_seconds: u64,
    pub same_tasks: bool,
    pub parallel_evaluation: bool,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            difficulties: [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
                .into_iter()
                .collect(),
            task_count: 10,
            tags: HashSet::new(),
            schema: SchemaSelector::Basic,
            scorer_preset: ScorerPreset::Default,
            dialect: Dialect::Sqlite,
            timeout_seconds: 30,
            same_tasks: true,
            parallel_evaluation: true,
        }
    }
}

/// The raw request received at the core boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentRequest {
    pub participants: HashMap<String, String>,
    pub config: RawAssessmentConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAssessmentConfig {
    pub difficulty: Option<Vec<String>>,
    pub task_count: Option<usize>,
    pub tags: Option<Vec<String>>,
    pub schema: Option<String>,
    pub scorer_preset: Option<String>,
    pub dialect: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub same_tasks: Option<bool>,
    pub parallel_evaluation: Option<bool>,
}

impl RawAssessmentConfig {
    /// Parse and validate into an `AssessmentConfig`, applying defaults for
    /// anything unset. Unknown dialect/preset strings are a configuration
    /// error, and `same_tasks=false` is rejected: no per-candidate sampling
    /// policy is defined yet.
    pub fn into_config(self) -> Result<AssessmentConfig, CoreError> {
        let defaults = AssessmentConfig::default();

        let difficulties = match self.difficulty {
            Some(raw) => {
                let mut set = HashSet::new();
                for d in raw {
                    let parsed = Difficulty::parse(&d)
                        .ok_or_else(|| CoreError::Configuration(format!("unknown difficulty: {d}")))?;
                    set.insert(parsed);
                }
                set
            }
            None => defaults.difficulties,
        };

        let schema = match self.schema.as_deref() {
            Some("basic") | None => SchemaSelector::Basic,
            Some("enterprise") => SchemaSelector::Enterprise,
            Some(other) => {
                return Err(CoreError::Configuration(format!("unknown schema selector: {other}")))
            }
        };

        let scorer_preset = match self.scorer_preset {
            Some(raw) => ScorerPreset::parse(&raw)
                .ok_or_else(|| CoreError::Configuration(format!("unknown scorer preset: {raw}")))?,
            None => defaults.scorer_preset,
        };

        let dialect = match self.dialect {
            Some(raw) => Dialect::parse(&raw)
                .ok_or_else(|| CoreError::Configuration(format!("unknown dialect: {raw}")))?,
            None => defaults.dialect,
        };

        let same_tasks = self.same_tasks.unwrap_or(defaults.same_tasks);
        if !same_tasks {
            return Err(CoreError::Configuration(
                "same_tasks=false is not supported: no per-candidate sampling policy is defined"
                    .to_string(),
            ));
        }

        Ok(AssessmentConfig {
            difficulties,
            task_count: self.task_count.unwrap_or(defaults.task_count),
            tags: self.tags.unwrap_or_default().into_iter().collect(),
            schema,
            scorer_preset,
            dialect,
            timeout_seconds: self.timeout_seconds.unwrap_or(defaults.timeout_seconds),
            same_tasks,
            parallel_evaluation: self
                .parallel_evaluation
                .unwrap_or(defaults.parallel_evaluation),
        })
    }
}

/// Outcome of executing one SQL statement against the reference database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows_returned: usize,
    #[serde(default)]
    pub execution_time_ms: f64,
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub validation_errors: Vec<String>,
    #[serde(default)]
    pub validation_warnings: Vec<String>,
    #[serde(default)]
    pub query_type: Option<String>,
    #[serde(default)]
    pub tables_accessed: Vec<String>,
    #[serde(default)]
    pub columns_accessed: Vec<String>,
    #[serde(default)]
    pub phantom_tables: Vec<String>,
    #[serde(default)]
    pub phantom_columns: Vec<String>,

    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

fn default_true() -> bool {
    true
}

impl ExecutionResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            columns: Vec::new(),
            rows_returned: 0,
            execution_time_ms: 0.0,
            error: Some(error.into()),
            is_valid: false,
            validation_errors: Vec::new(),
            validation_warnings: Vec::new(),
            query_type: None,
            tables_accessed: Vec::new(),
            columns_accessed: Vec::new(),
            phantom_tables: Vec::new(),
            phantom_columns: Vec::new(),
            insights: Vec::new(),
            summary: String::new(),
        }
    }
}

/// Result of comparing an actual row-set against an expected one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub is_match: bool,
    pub match_score: f64,
    pub row_count_match: bool,
    pub column_count_match: bool,
    pub details: serde_json::Map<String, Value>,
}

/// The four primary scoring dimensions plus advisory auxiliary dimensions
/// and sub-scores, all in `[0, 1]`. `overall` is the weighted sum of the
/// four primary dimensions only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiDimensionalScore {
    pub correctness: f64,
    pub efficiency: f64,
    pub safety: f64,
    pub completeness: f64,

    /// Advisory only; never folded into `overall` unless a preset remaps
    /// weights to include them (none currently do).
    pub semantic_accuracy: f64,
    pub best_practices: f64,
    pub plan_quality: f64,

    pub validation_score: f64,
    pub hallucination_score: f64,
    pub performance_score: f64,

    pub overall: f64,
    pub weights: HashMap<String, f64>,

    pub details: serde_json::Map<String, Value>,
}

/// Per (candidate, task) outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub question: String,
    pub submitted_sql: String,
    pub gold_sql: Option<String>,
    pub execution: ExecutionResult,
    pub comparison: Option<ComparisonResult>,
    pub score: MultiDimensionalScore,
    pub classification: ErrorClassification,
}

/// Error-metric rollup for one candidate: totals, per-category/subcategory
/// counts, and the most common failing query type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorMetricsSummary {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub category_counts: HashMap<String, usize>,
    pub subcategory_counts: HashMap<String, usize>,
    pub subcategory_examples: HashMap<String, Vec<ErrorExample>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorExample {
    pub task_id: String,
    pub sql_snippet: String,
    pub details: String,
    pub evidence: Vec<String>,
}

impl ErrorMetricsSummary {
    pub fn record(&mut self, task_id: &str, submitted_sql: &str, classification: &ErrorClassification) {
        self.total_tasks += 1;
        if classification.subcategory == "no_error" {
            self.successful_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }

        *self
            .category_counts
            .entry(classification.category.clone())
            .or_insert(0) += 1;
        *self
            .subcategory_counts
            .entry(classification.subcategory.clone())
            .or_insert(0) += 1;

        let examples = self
            .subcategory_examples
            .entry(classification.subcategory.clone())
            .or_default();
        if examples.len() < 5 {
            let snippet: String = submitted_sql.chars().take(200).collect();
            examples.push(ErrorExample {
                task_id: task_id.to_string(),
                sql_snippet: snippet,
                details: classification.details.clone(),
                evidence: classification.evidence.clone(),
            });
        }
    }

    /// Percentages over failed tasks only; `no_error` is excluded.
    pub fn category_percentages(&self) -> HashMap<String, f64> {
        percentages_over(&self.category_counts, self.failed_tasks, "no_error")
    }

    pub fn subcategory_percentages(&self) -> HashMap<String, f64> {
        percentages_over(&self.subcategory_counts, self.failed_tasks, "no_error")
    }
}

fn percentages_over(
    counts: &HashMap<String, usize>,
    denominator: usize,
    exclude: &str,
) -> HashMap<String, f64> {
    if denominator == 0 {
        return HashMap::new();
    }
    counts
        .iter()
        .filter(|(k, _)| k.as_str() != exclude)
        .map(|(k, v)| (k.clone(), round4(*v as f64 / denominator as f64 * 100.0)))
        .collect()
}

fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

/// Per-candidate rollup after an assessment completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub candidate_id: String,
    pub endpoint: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub average_scores: MultiDimensionalScoreAverage,
    pub task_results: Vec<TaskResult>,
    pub error_metrics: ErrorMetricsSummary,
}

/// Arithmetic mean of every dimension/sub-score across a candidate's task
/// results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiDimensionalScoreAverage {
    pub correctness: f64,
    pub efficiency: f64,
    pub safety: f64,
    pub completeness: f64,
    pub semantic_accuracy: f64,
    pub best_practices: f64,
    pub plan_quality: f64,
    pub validation_score: f64,
    pub hallucination_score: f64,
    pub performance_score: f64,
    pub overall: f64,
}

/// One row of the task-by-task comparison matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComparisonRow {
    pub task_id: String,
    pub agent_scores: HashMap<String, TaskComparisonEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComparisonEntry {
    pub overall: f64,
    pub sql: String,
    pub execution_success: bool,
}

/// One entry in the final ranking, ordered by `overall` descending, ties
/// broken by `candidate_id` ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub candidate_id: String,
    pub overall: f64,
}

/// Final artifact emitted once per assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentArtifact {
    pub assessment_id: String,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub rankings: Vec<RankingEntry>,
    pub participants: HashMap<String, ParticipantSummary>,
    pub task_comparison: Option<Vec<TaskComparisonRow>>,
}

/// Status of one entry in the progress stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskUpdateStatus {
    Submitted,
    Working,
    Completed,
    Failed,
}

/// One entry in the progress stream.
#[derive(Debug, Clone, Serialize)]
pub struct TaskUpdate {
    pub status: TaskUpdateStatus,
    pub message: String,
    pub progress: Option<f64>,
    pub data: Option<Value>,
    pub artifact: Option<AssessmentArtifact>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TaskUpdate {
    pub fn submitted(message: impl Into<String>) -> Self {
        Self {
            status: TaskUpdateStatus::Submitted,
            message: message.into(),
            progress: Some(0.0),
            data: None,
            artifact: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn working(message: impl Into<String>, progress: f64) -> Self {
        Self {
            status: TaskUpdateStatus::Working,
            message: message.into(),
            progress: Some(progress),
            data: None,
            artifact: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TaskUpdateStatus::Failed,
            message: message.into(),
            progress: None,
            data: None,
            artifact: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn completed(message: impl Into<String>, artifact: AssessmentArtifact) -> Self {
        Self {
            status: TaskUpdateStatus::Completed,
            message: message.into(),
            progress: Some(1.0),
            data: None,
            artifact: Some(artifact),
            timestamp: chrono::Utc::now(),
        }
    }
}
