//! Multi-dimensional scorer: correctness/efficiency/safety/completeness,
//! a piecewise efficiency curve, and a hallucination-keyword heuristic,
//! all parameterized by a named preset.

use std::collections::HashMap;

use serde_json::json;

use crate::types::{ComparisonResult, ExecutionResult, MultiDimensionalScore};

const PERF_EXCELLENT_MS: f64 = 10.0;
const PERF_GOOD_MS: f64 = 100.0;
const PERF_ACCEPTABLE_MS: f64 = 1000.0;

const HALLUCINATION_KEYWORDS: &[&str] = &[
    "does not exist",
    "unknown column",
    "unknown table",
    "invalid",
    "not found",
    "no such",
    "doesn't exist",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Default,
    Strict,
    Performance,
    Quality,
}

impl Preset {
    fn weights(self) -> [(&'static str, f64); 4] {
        match self {
            Preset::Default => [
                ("correctness", 0.40),
                ("efficiency", 0.20),
                ("safety", 0.25),
                ("completeness", 0.15),
            ],
            Preset::Strict => [
                ("correctness", 0.60),
                ("safety", 0.25),
                ("efficiency", 0.05),
                ("completeness", 0.10),
            ],
            Preset::Performance => [
                ("efficiency", 0.45),
                ("correctness", 0.30),
                ("safety", 0.15),
                ("completeness", 0.10),
            ],
            Preset::Quality => [
                ("completeness", 0.35),
                ("correctness", 0.30),
                ("safety", 0.25),
                ("efficiency", 0.10),
            ],
        }
    }
}

impl From<crate::types::ScorerPreset> for Preset {
    fn from(p: crate::types::ScorerPreset) -> Self {
        match p {
            crate::types::ScorerPreset::Default => Preset::Default,
            crate::types::ScorerPreset::Strict => Preset::Strict,
            crate::types::ScorerPreset::Performance => Preset::Performance,
            crate::types::ScorerPreset::Quality => Preset::Quality,
        }
    }
}

pub struct Scorer {
    preset: Preset,
}

impl Scorer {
    pub fn new(preset: Preset) -> Self {
        Self { preset }
    }

    pub fn score(
        &self,
        comparison: Option<&ComparisonResult>,
        execution: &ExecutionResult,
    ) -> MultiDimensionalScore {
        let correctness = correctness(comparison);
        let efficiency = efficiency(execution);
        let validation_score = validation_score(execution);
        let hallucination_score = hallucination_score(execution);
        let safety = 0.4 * validation_score + 0.6 * hallucination_score;
        let completeness = completeness(execution);

        let weights: HashMap<String, f64> = self
            .preset
            .weights()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        let details = [
            (
                "comparison",
                comparison
                    .map(|c| {
                        json!({
                            "is_match": c.is_match,
                            "match_score": c.match_score,
                            "row_count_match": c.row_count_match,
                            "column_count_match": c.column_count_match,
                        })
                    })
                    .unwrap_or(json!(null)),
            ),
            (
                "execution",
                json!({
                    "success": execution.success,
                    "execution_time_ms": execution.execution_time_ms,
                    "rows_returned": execution.rows_returned,
                    "error": execution.error,
                }),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        self.finish(correctness, efficiency, safety, completeness, validation_score, hallucination_score, weights, details)
    }

    /// All dimensions zeroed, used by the orchestrator to synthesize a
    /// TaskResult for a candidate that never produced usable SQL (empty
    /// response or a dispatch failure).
    pub fn zero(&self) -> MultiDimensionalScore {
        let weights: HashMap<String, f64> = self
            .preset
            .weights()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        self.finish(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, weights, serde_json::Map::new())
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        correctness: f64,
        efficiency: f64,
        safety: f64,
        completeness: f64,
        validation_score: f64,
        hallucination_score: f64,
        weights: HashMap<String, f64>,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> MultiDimensionalScore {
        let overall = weights["correctness"] * correctness
            + weights["efficiency"] * efficiency
            + weights["safety"] * safety
            + weights["completeness"] * completeness;

        MultiDimensionalScore {
            correctness: round4(correctness),
            efficiency: round4(efficiency),
            safety: round4(safety),
            completeness: round4(completeness),
            // Advisory-only: reported but never folded into `overall` by
            // any current preset.
            semantic_accuracy: 1.0,
            best_practices: 1.0,
            plan_quality: 1.0,
            validation_score: round4(validation_score),
            hallucination_score: round4(hallucination_score),
            performance_score: round4(efficiency),
            overall: round4(overall),
            weights,
            details,
        }
    }
}

fn correctness(comparison: Option<&ComparisonResult>) -> f64 {
    match comparison {
        Some(c) if c.is_match => 1.0,
        Some(c) => c.match_score,
        None => 0.0,
    }
}

fn efficiency(execution: &ExecutionResult) -> f64 {
    if !execution.success {
        return 0.0;
    }
    let time_ms = execution.execution_time_ms;

    if time_ms <= PERF_EXCELLENT_MS {
        1.0
    } else if time_ms <= PERF_GOOD_MS {
        let ratio = (time_ms - PERF_EXCELLENT_MS) / (PERF_GOOD_MS - PERF_EXCELLENT_MS);
        1.0 - 0.2 * ratio
    } else if time_ms <= PERF_ACCEPTABLE_MS {
        let ratio = (time_ms - PERF_GOOD_MS) / (PERF_ACCEPTABLE_MS - PERF_GOOD_MS);
        0.8 - 0.3 * ratio
    } else {
        let excess = time_ms - PERF_ACCEPTABLE_MS;
        (0.5 - excess / 10000.0).max(0.0)
    }
}

fn validation_score(execution: &ExecutionResult) -> f64 {
    if execution.is_valid {
        let warnings = execution.validation_warnings.len() as f64;
        (1.0 - warnings * 0.1).max(0.0)
    } else {
        match execution.validation_errors.len() {
            0 => 0.5,
            1 => 0.3,
            _ => 0.1,
        }
    }
}

fn hallucination_score(execution: &ExecutionResult) -> f64 {
    if execution.is_valid && execution.validation_errors.is_empty() {
        return 1.0;
    }
    let count = execution
        .validation_errors
        .iter()
        .filter(|e| {
            let lower = e.to_lowercase();
            HALLUCINATION_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .count();
    match count {
        0 => 1.0,
        1 => 0.4,
        _ => 0.1,
    }
}

fn completeness(execution: &ExecutionResult) -> f64 {
    if !execution.success {
        return 0.0;
    }
    let mut score: f64 = 1.0;
    for insight in &execution.insights {
        let lower = insight.to_lowercase();
        if lower.contains("no results") || lower.contains("empty") {
            score -= 0.2;
        } else if lower.contains("truncated") {
            score -= 0.1;
        } else if lower.contains("null") {
            score -= 0.05;
        } else if lower.contains("slow") || lower.contains("long") {
            score -= 0.1;
        }
    }
    if execution.rows_returned > 0 {
        score = (score + 0.1).min(1.0);
    }
    score.max(0.0)
}

fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_exec(time_ms: f64) -> ExecutionResult {
        ExecutionResult {
            success: true,
            execution_time_ms: time_ms,
            rows_returned: 1,
            is_valid: true,
            ..ExecutionResult::failed("")
        }
    }

    #[test]
    fn weight_sum_is_one_for_every_preset() {
        for preset in [Preset::Default, Preset::Strict, Preset::Performance, Preset::Quality] {
            let sum: f64 = preset.weights().iter().map(|(_, w)| w).sum();
            assert!((sum - 1.0).abs() < 1e-9, "{preset:?} weights sum to {sum}");
        }
    }

    #[test]
    fn score_bounds_hold() {
        let scorer = Scorer::new(Preset::Default);
        let exec = success_exec(5000.0);
        let score = scorer.score(None, &exec);
        for v in [
            score.correctness,
            score.efficiency,
            score.safety,
            score.completeness,
            score.overall,
        ] {
            assert!((0.0..=1.0).contains(&v), "score field out of bounds: {v}");
        }
    }

    #[test]
    fn correctness_monotonicity() {
        let scorer = Scorer::new(Preset::Default);
        let exec = success_exec(5.0);
        let low = ComparisonResult {
            is_match: false,
            match_score: 0.2,
            row_count_match: false,
            column_count_match: false,
            details: Default::default(),
        };
        let high = ComparisonResult {
            match_score: 0.8,
            ..low.clone()
        };
        let low_score = scorer.score(Some(&low), &exec);
        let high_score = scorer.score(Some(&high), &exec);
        assert!(high_score.overall >= low_score.overall);
    }

    #[test]
    fn efficiency_monotonicity() {
        let scorer = Scorer::new(Preset::Default);
        let fast = scorer.score(None, &success_exec(5.0));
        let slow = scorer.score(None, &success_exec(5000.0));
        assert!(fast.efficiency >= slow.efficiency);
    }

    #[test]
    fn efficiency_thresholds_match_spec() {
        assert_eq!(round4(efficiency(&success_exec(10.0))), 1.0);
        assert_eq!(round4(efficiency(&success_exec(100.0))), 0.8);
        assert_eq!(round4(efficiency(&success_exec(1000.0))), 0.5);
    }

    #[test]
    fn failed_execution_zeroes_efficiency_and_completeness() {
        let exec = ExecutionResult::failed("boom");
        assert_eq!(efficiency(&exec), 0.0);
        assert_eq!(completeness(&exec), 0.0);
    }
}
