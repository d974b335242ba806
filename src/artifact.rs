//! Artifact assembly: per-participant rollups, a deterministic ranking,
//! and the task-comparison matrix.

use std::collections::HashMap;

use crate::types::{
    AssessmentArtifact, ErrorMetricsSummary, MultiDimensionalScoreAverage, ParticipantSummary,
    RankingEntry, TaskComparisonEntry, TaskComparisonRow, TaskResult,
};

pub struct ArtifactBuilder;

impl ArtifactBuilder {
    /// `accumulator` maps candidate id to its task results, in gold-task
    /// order. `endpoints` maps candidate id to the URL it was dispatched
    /// to. `same_tasks` gates whether the task-comparison matrix is built.
    pub fn build(
        assessment_id: String,
        endpoints: &HashMap<String, String>,
        accumulator: HashMap<String, Vec<TaskResult>>,
        same_tasks: bool,
    ) -> AssessmentArtifact {
        let mut participants = HashMap::new();
        for (candidate_id, task_results) in &accumulator {
            let summary = Self::summarize(
                candidate_id.clone(),
                endpoints.get(candidate_id).cloned().unwrap_or_default(),
                task_results.clone(),
            );
            participants.insert(candidate_id.clone(), summary);
        }

        let rankings = Self::rank(&participants);

        let task_comparison = if same_tasks {
            Some(Self::task_comparison_matrix(&accumulator))
        } else {
            None
        };

        AssessmentArtifact {
            assessment_id,
            completed_at: chrono::Utc::now(),
            rankings,
            participants,
            task_comparison,
        }
    }

    fn summarize(candidate_id: String, endpoint: String, task_results: Vec<TaskResult>) -> ParticipantSummary {
        let total = task_results.len();
        let successful = task_results.iter().filter(|t| t.execution.success).count();
        let failed = total - successful;

        let mut error_metrics = ErrorMetricsSummary::default();
        for task in &task_results {
            error_metrics.record(&task.task_id, &task.submitted_sql, &task.classification);
        }

        let average_scores = Self::average_scores(&task_results);

        ParticipantSummary {
            candidate_id,
            endpoint,
            total,
            successful,
            failed,
            average_scores,
            task_results,
            error_metrics,
        }
    }

    fn average_scores(task_results: &[TaskResult]) -> MultiDimensionalScoreAverage {
        let n = task_results.len() as f64;
        if n == 0.0 {
            return MultiDimensionalScoreAverage::default();
        }

        let mut sum = MultiDimensionalScoreAverage::default();
        for task in task_results {
            let s = &task.score;
            sum.correctness += s.correctness;
            sum.efficiency += s.efficiency;
            sum.safety += s.safety;
            sum.completeness += s.completeness;
            sum.semantic_accuracy += s.semantic_accuracy;
            sum.best_practices += s.best_practices;
            sum.plan_quality += s.plan_quality;
            sum.validation_score += s.validation_score;
            sum.hallucination_score += s.hallucination_score;
            sum.performance_score += s.performance_score;
            sum.overall += s.overall;
        }

        MultiDimensionalScoreAverage {
            correctness: round4(sum.correctness / n),
            efficiency: round4(sum.efficiency / n),
            safety: round4(sum.safety / n),
            completeness: round4(sum.completeness / n),
            semantic_accuracy: round4(sum.semantic_accuracy / n),
            best_practices: round4(sum.best_practices / n),
            plan_quality: round4(sum.plan_quality / n),
            validation_score: round4(sum.validation_score / n),
            hallucination_score: round4(sum.hallucination_score / n),
            performance_score: round4(sum.performance_score / n),
            overall: round4(sum.overall / n),
        }
    }

    /// Descending by `overall`; ties broken by candidate id ascending so
    /// the ranking is total and deterministic.
    fn rank(participants: &HashMap<String, ParticipantSummary>) -> Vec<RankingEntry> {
        let mut entries: Vec<(&String, f64)> = participants
            .iter()
            .map(|(id, summary)| (id, summary.average_scores.overall))
            .collect();

        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(b.0)));

        entries
            .into_iter()
            .enumerate()
            .map(|(index, (candidate_id, overall))| RankingEntry {
                rank: index + 1,
                candidate_id: candidate_id.clone(),
                overall,
            })
            .collect()
    }

    fn task_comparison_matrix(accumulator: &HashMap<String, Vec<TaskResult>>) -> Vec<TaskComparisonRow> {
        let task_count = accumulator.values().map(|v| v.len()).max().unwrap_or(0);
        let mut rows = Vec::with_capacity(task_count);

        for i in 0..task_count {
            let mut task_id = String::new();
            let mut agent_scores = HashMap::new();
            for (candidate_id, task_results) in accumulator {
                if let Some(task) = task_results.get(i) {
                    if task_id.is_empty() {
                        task_id = task.task_id.clone();
                    }
                    let sql: String = task.submitted_sql.chars().take(200).collect();
                    agent_scores.insert(
                        candidate_id.clone(),
                        TaskComparisonEntry {
                            overall: task.score.overall,
                            sql,
                            execution_success: task.execution.success,
                        },
                    );
                }
            }
            rows.push(TaskComparisonRow { task_id, agent_scores });
        }

        rows
    }
}

fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierInput, ErrorClassifier};
    use crate::types::{ComparisonResult, ExecutionResult, MultiDimensionalScore};
    use std::collections::HashMap as Map;

    fn task_result(task_id: &str, overall: f64) -> TaskResult {
        TaskResult {
            task_id: task_id.to_string(),
            question: "q".to_string(),
            submitted_sql: "SELECT 1".to_string(),
            gold_sql: None,
            execution: ExecutionResult::failed("unused"),
            comparison: None::<ComparisonResult>,
            score: MultiDimensionalScore {
                correctness: overall,
                efficiency: overall,
                safety: overall,
                completeness: overall,
                semantic_accuracy: 1.0,
                best_practices: 1.0,
                plan_quality: 1.0,
                validation_score: overall,
                hallucination_score: overall,
                performance_score: overall,
                overall,
                weights: Map::new(),
                details: serde_json::Map::new(),
            },
            classification: ErrorClassifier::new().classify(&ClassifierInput {
                submitted_sql: "SELECT 1",
                gold_sql: None,
                execution_success: true,
                validation_errors: &[],
                phantom_tables: &[],
                phantom_columns: &[],
                error_message: None,
                match_score: Some(1.0),
            }),
        }
    }

    #[test]
    fn ranking_orders_by_overall_then_id() {
        let mut accumulator = Map::new();
        accumulator.insert("beta".to_string(), vec![task_result("t1", 0.8)]);
        accumulator.insert("alpha".to_string(), vec![task_result("t1", 0.8)]);
        accumulator.insert("gamma".to_string(), vec![task_result("t1", 0.5)]);

        let endpoints = Map::new();
        let artifact = ArtifactBuilder::build("a1".to_string(), &endpoints, accumulator, true);

        assert_eq!(artifact.rankings.len(), 3);
        assert_eq!(artifact.rankings[0].candidate_id, "alpha");
        assert_eq!(artifact.rankings[1].candidate_id, "beta");
        assert_eq!(artifact.rankings[2].candidate_id, "gamma");
    }

    #[test]
    fn task_comparison_matrix_omitted_when_not_same_tasks() {
        let mut accumulator = Map::new();
        accumulator.insert("alpha".to_string(), vec![task_result("t1", 0.8)]);
        let endpoints = Map::new();
        let artifact = ArtifactBuilder::build("a1".to_string(), &endpoints, accumulator, false);
        assert!(artifact.task_comparison.is_none());
    }
}
