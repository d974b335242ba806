//! Result comparator: compares an actual row-set against an expected one
//! under configurable numeric tolerance and row/column ordering. Weights
//! and thresholds are fixed and reproduced exactly.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use crate::types::{ComparisonResult, Row};

#[derive(Debug, Clone)]
pub struct ComparatorConfig {
    pub numeric_tolerance: f64,
    pub ignore_row_order: bool,
    pub case_sensitive: bool,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            numeric_tolerance: 1e-6,
            ignore_row_order: true,
            case_sensitive: false,
        }
    }
}

pub struct ResultComparator {
    config: ComparatorConfig,
}

impl ResultComparator {
    pub fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    pub fn compare(&self, actual: &[Row], expected: &[Row]) -> ComparisonResult {
        if actual.is_empty() && expected.is_empty() {
            return ComparisonResult {
                is_match: true,
                match_score: 1.0,
                row_count_match: true,
                column_count_match: true,
                details: details_map(&[("message", json!("Both results are empty"))]),
            };
        }

        if actual.is_empty() {
            return ComparisonResult {
                is_match: false,
                match_score: 0.0,
                row_count_match: false,
                column_count_match: false,
                details: details_map(&[
                    ("message", json!("Actual result is empty")),
                    ("expected_rows", json!(expected.len())),
                ]),
            };
        }

        if expected.is_empty() {
            return ComparisonResult {
                is_match: false,
                match_score: 0.0,
                row_count_match: false,
                column_count_match: false,
                details: details_map(&[
                    ("message", json!("Expected result is empty")),
                    ("actual_rows", json!(actual.len())),
                ]),
            };
        }

        let actual_columns: HashSet<&String> = actual[0].keys().collect();
        let expected_columns: HashSet<&String> = expected[0].keys().collect();

        let column_count_match = actual_columns.len() == expected_columns.len();
        let missing_columns: Vec<&String> =
            expected_columns.difference(&actual_columns).copied().collect();
        let extra_columns: Vec<&String> =
            actual_columns.difference(&expected_columns).copied().collect();
        let common_columns: HashSet<&String> =
            actual_columns.intersection(&expected_columns).copied().collect();

        let row_count_match = actual.len() == expected.len();

        let column_match_ratio = if !expected_columns.is_empty() {
            common_columns.len() as f64 / expected_columns.len() as f64
        } else if actual_columns.is_empty() {
            1.0
        } else {
            0.0
        };

        let (row_match_ratio, matched_rows, unmatched_rows) = if common_columns.is_empty() {
            (0.0, 0, expected.len())
        } else if self.config.ignore_row_order {
            self.compare_rows_unordered(actual, expected, &common_columns)
        } else {
            self.compare_rows_ordered(actual, expected, &common_columns)
        };

        let match_score =
            round4(0.50 * row_match_ratio + 0.30 * column_match_ratio + 0.10 * b(row_count_match) + 0.10 * b(column_count_match));

        let is_match = match_score >= 0.99
            && row_count_match
            && column_count_match
            && missing_columns.is_empty()
            && extra_columns.is_empty();

        ComparisonResult {
            is_match,
            match_score,
            row_count_match,
            column_count_match,
            details: details_map(&[
                ("actual_row_count", json!(actual.len())),
                ("expected_row_count", json!(expected.len())),
                ("missing_columns", json!(sorted(&missing_columns))),
                ("extra_columns", json!(sorted(&extra_columns))),
                ("column_match_ratio", json!(column_match_ratio)),
                ("row_match_ratio", json!(row_match_ratio)),
                ("matched_rows", json!(matched_rows)),
                ("unmatched_rows", json!(unmatched_rows)),
            ]),
        }
    }

    fn compare_rows_unordered(
        &self,
        actual: &[Row],
        expected: &[Row],
        columns: &HashSet<&String>,
    ) -> (f64, usize, usize) {
        let mut matched = 0usize;
        let mut expected_matched = vec![false; expected.len()];

        for actual_row in actual {
            for (i, expected_row) in expected.iter().enumerate() {
                if expected_matched[i] {
                    continue;
                }
                if self.rows_match(actual_row, expected_row, columns) {
                    matched += 1;
                    expected_matched[i] = true;
                    break;
                }
            }
        }

        let ratio = if expected.is_empty() {
            1.0
        } else {
            matched as f64 / expected.len() as f64
        };
        (ratio, matched, expected.len() - matched)
    }

    fn compare_rows_ordered(
        &self,
        actual: &[Row],
        expected: &[Row],
        columns: &HashSet<&String>,
    ) -> (f64, usize, usize) {
        let min_len = actual.len().min(expected.len());
        let matched = (0..min_len)
            .filter(|&i| self.rows_match(&actual[i], &expected[i], columns))
            .count();
        let ratio = if expected.is_empty() {
            1.0
        } else {
            matched as f64 / expected.len() as f64
        };
        (ratio, matched, expected.len() - matched)
    }

    fn rows_match(&self, actual: &Row, expected: &Row, columns: &HashSet<&String>) -> bool {
        columns.iter().all(|col| {
            self.values_match(actual.get(col.as_str()), expected.get(col.as_str()))
        })
    }

    fn values_match(&self, actual: Option<&Value>, expected: Option<&Value>) -> bool {
        match (actual, expected) {
            (None | Some(Value::Null), None | Some(Value::Null)) => true,
            (None, Some(_)) | (Some(_), None) => false,
            (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(fa), Some(fb)) => {
                    if fa.is_nan() && fb.is_nan() {
                        true
                    } else {
                        (fa - fb).abs() <= self.config.numeric_tolerance
                    }
                }
                _ => match (a.as_str(), b.as_str()) {
                    (Some(sa), Some(sb)) => {
                        if self.config.case_sensitive {
                            sa == sb
                        } else {
                            sa.eq_ignore_ascii_case(sb)
                        }
                    }
                    _ => a == b,
                },
            },
        }
    }
}

fn b(v: bool) -> f64 {
    if v {
        1.0
    } else {
        0.0
    }
}

fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

fn sorted(v: &[&String]) -> Vec<String> {
    let mut out: Vec<String> = v.iter().map(|s| s.to_string()).collect();
    out.sort();
    out
}

fn details_map(entries: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in entries {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn both_empty_is_exact_match() {
        let cmp = ResultComparator::new(ComparatorConfig::default());
        let result = cmp.compare(&[], &[]);
        assert!(result.is_match);
        assert_eq!(result.match_score, 1.0);
    }

    #[test]
    fn one_empty_is_no_match() {
        let cmp = ResultComparator::new(ComparatorConfig::default());
        let expected = vec![row(&[("x", json!(1))])];
        let result = cmp.compare(&[], &expected);
        assert!(!result.is_match);
        assert_eq!(result.match_score, 0.0);
    }

    #[test]
    fn tolerant_numeric_match() {
        let cmp = ResultComparator::new(ComparatorConfig::default());
        let expected = vec![row(&[("v", json!(1.0))])];
        let actual = vec![row(&[("v", json!(1.0 + 1e-7))])];
        let result = cmp.compare(&actual, &expected);
        assert!(result.is_match);
        assert_eq!(result.match_score, 1.0);
    }

    #[test]
    fn row_order_independence() {
        let cmp = ResultComparator::new(ComparatorConfig::default());
        let expected = vec![row(&[("id", json!(1))]), row(&[("id", json!(2))])];
        let actual = vec![row(&[("id", json!(2))]), row(&[("id", json!(1))])];
        let result = cmp.compare(&actual, &expected);
        assert!(result.is_match);
    }

    #[test]
    fn ordered_mode_penalizes_order() {
        let cmp = ResultComparator::new(ComparatorConfig {
            ignore_row_order: false,
            ..Default::default()
        });
        let expected = vec![row(&[("id", json!(1))]), row(&[("id", json!(2))])];
        let actual = vec![row(&[("id", json!(2))]), row(&[("id", json!(1))])];
        let result = cmp.compare(&actual, &expected);
        assert!(!result.is_match);
        assert_eq!(result.match_score, 0.50);
    }

    #[test]
    fn idempotence_on_identical_input() {
        let cmp = ResultComparator::new(ComparatorConfig::default());
        let rows = vec![row(&[("a", json!(1)), ("b", json!("x"))])];
        let result = cmp.compare(&rows, &rows);
        assert!(result.is_match);
        assert_eq!(result.match_score, 1.0);
    }

    #[test]
    fn case_insensitive_strings_by_default() {
        let cmp = ResultComparator::new(ComparatorConfig::default());
        let expected = vec![row(&[("s", json!("Hello"))])];
        let actual = vec![row(&[("s", json!("hello"))])];
        let result = cmp.compare(&actual, &expected);
        assert!(result.is_match);
    }

    #[test]
    fn case_sensitive_strings_when_configured() {
        let cmp = ResultComparator::new(ComparatorConfig {
            case_sensitive: true,
            ..Default::default()
        });
        let expected = vec![row(&[("s", json!("Hello"))])];
        let actual = vec![row(&[("s", json!("hello"))])];
        let result = cmp.compare(&actual, &expected);
        assert!(!result.is_match);
    }
}
