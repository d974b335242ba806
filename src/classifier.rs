//! Error classifier: maps execution/validation evidence into a fixed
//! reporting taxonomy, used only for aggregation — never for control flow.
//!
//! Pattern families, their ordering, and confidence values are fixed and
//! reproduced exactly; the first family with a hit wins.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub category: String,
    pub subcategory: String,
    pub confidence: f64,
    pub details: String,
    pub evidence: Vec<String>,
}

impl ErrorClassification {
    fn new(
        category: &str,
        subcategory: &str,
        confidence: f64,
        details: impl Into<String>,
        evidence: Vec<String>,
    ) -> Self {
        Self {
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            confidence,
            details: details.into(),
            evidence,
        }
    }

    fn no_error(confidence: f64, details: &str) -> Self {
        Self::new("no_error", "no_error", confidence, details, Vec::new())
    }
}

struct PatternFamily {
    category: &'static str,
    subcategory: &'static str,
    confidence: f64,
    set: RegexSet,
    patterns: Vec<Regex>,
}

impl PatternFamily {
    fn new(category: &'static str, subcategory: &'static str, confidence: f64, raw: &[&str]) -> Self {
        let patterns: Vec<Regex> = raw
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).expect("static pattern is valid"))
            .collect();
        let set = RegexSet::new(raw.iter().map(|p| format!("(?i){p}"))).expect("static pattern is valid");
        Self {
            category,
            subcategory,
            confidence,
            set,
            patterns,
        }
    }

    fn first_match(&self, text: &str) -> Option<String> {
        let idx = self.set.matches(text).into_iter().next()?;
        self.patterns[idx].find(text).map(|m| m.as_str().to_string())
    }
}

/// Ordered list: the first family with a hit wins.
static PATTERN_FAMILIES: Lazy<Vec<PatternFamily>> = Lazy::new(|| {
    vec![
        PatternFamily::new(
            "schema_error",
            "wrong_table",
            0.9,
            &[
                r"table\s+'?(\w+)'?\s+does\s+not\s+exist",
                r"no\s+such\s+table:?\s*'?(\w+)'?",
                r"relation\s+'?(\w+)'?\s+does\s+not\s+exist",
                r"unknown\s+table\s+'?(\w+)'?",
            ],
        ),
        PatternFamily::new(
            "schema_error",
            "wrong_column",
            0.9,
            &[
                r"column\s+'?(\w+)'?\s+does\s+not\s+exist",
                r"no\s+such\s+column:?\s*'?(\w+)'?",
                r"unknown\s+column\s+'?(\w+)'?",
                r"ambiguous\s+column\s+name:?\s*'?(\w+)'?",
            ],
        ),
        PatternFamily::new(
            "sql_error",
            "syntax_error",
            0.9,
            &[
                r"syntax\s+error",
                r"parse\s+error",
                r"unexpected\s+token",
                r"missing\s+';'",
                r#"near\s+"(\w+)":\s+syntax\s+error"#,
            ],
        ),
        PatternFamily::new(
            "sql_error",
            "join_error",
            0.85,
            &[
                r"ambiguous\s+column",
                r"join\s+(condition|clause)\s+.*(missing|invalid)",
                r"cannot\s+resolve\s+.*\s+in\s+join",
                r"invalid\s+join\s+specification",
            ],
        ),
        PatternFamily::new(
            "sql_error",
            "condition_filter_error",
            0.85,
            &[
                r"where\s+clause.*invalid",
                r"comparison\s+.*\s+incompatible",
                r"operator\s+does\s+not\s+exist",
                r"invalid\s+(comparison|operator)",
            ],
        ),
        PatternFamily::new(
            "sql_error",
            "incorrect_dialect_function_usage",
            0.85,
            &[
                r"function\s+'?(\w+)'?\s+does\s+not\s+exist",
                r"unknown\s+function",
                r"no\s+such\s+function",
                r"unsupported\s+function",
            ],
        ),
        PatternFamily::new(
            "analysis_error",
            "incorrect_planning",
            0.8,
            &[
                r"missing\s+group\s+by",
                r"aggregate.*without.*group",
                r"incorrect\s+aggregation",
            ],
        ),
        PatternFamily::new(
            "analysis_error",
            "incorrect_data_calculation",
            0.8,
            &[r"division\s+by\s+zero", r"numeric\s+overflow", r"invalid\s+arithmetic"],
        ),
    ]
});

static TABLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfrom\s+(\w+)|\bjoin\s+(\w+)").unwrap());

#[derive(Debug, Clone, Default)]
pub struct ClassifierInput<'a> {
    pub submitted_sql: &'a str,
    pub gold_sql: Option<&'a str>,
    pub execution_success: bool,
    pub validation_errors: &'a [String],
    pub phantom_tables: &'a [String],
    pub phantom_columns: &'a [String],
    pub error_message: Option<&'a str>,
    pub match_score: Option<f64>,
}

pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, input: &ClassifierInput) -> ErrorClassification {
        if input.execution_success && input.validation_errors.is_empty() {
            if let Some(score) = input.match_score {
                if score >= 0.95 {
                    return ErrorClassification::no_error(
                        1.0,
                        "Query executed successfully with correct results",
                    );
                }
            }
        }

        if !input.phantom_tables.is_empty() {
            return ErrorClassification::new(
                "schema_error",
                "wrong_table",
                0.95,
                format!(
                    "Referenced non-existent table(s): {}",
                    input.phantom_tables.join(", ")
                ),
                input.phantom_tables.to_vec(),
            );
        }

        if !input.phantom_columns.is_empty() {
            return ErrorClassification::new(
                "schema_error",
                "wrong_column",
                0.95,
                format!(
                    "Referenced non-existent column(s): {}",
                    input.phantom_columns.join(", ")
                ),
                input.phantom_columns.to_vec(),
            );
        }

        let mut all_errors: Vec<&str> = input.validation_errors.iter().map(String::as_str).collect();
        if let Some(msg) = input.error_message {
            all_errors.push(msg);
        }
        let error_text = all_errors.join(" ").to_lowercase();

        for family in PATTERN_FAMILIES.iter() {
            if let Some(hit) = family.first_match(&error_text) {
                return ErrorClassification::new(
                    family.category,
                    family.subcategory,
                    family.confidence,
                    format!("{} error detected: {}", family.subcategory, hit),
                    vec![hit],
                );
            }
        }

        if let (Some(gold), sql) = (input.gold_sql, input.submitted_sql) {
            let issues = schema_linking_diff(sql, gold);
            if !issues.is_empty() {
                return ErrorClassification::new(
                    "schema_error",
                    "wrong_schema_linking",
                    0.7,
                    "Incorrect schema linking detected",
                    issues,
                );
            }
        }

        if let Some(score) = input.match_score {
            if score < 0.5 && input.execution_success {
                return ErrorClassification::new(
                    "analysis_error",
                    "erroneous_data_analysis",
                    0.7,
                    format!("Results do not match expected (score: {score:.2})"),
                    vec![format!("match_score={score}")],
                );
            }
        }

        if !input.execution_success {
            if let Some(msg) = input.error_message {
                let snippet: String = msg.chars().take(200).collect();
                return ErrorClassification::new(
                    "sql_error",
                    "syntax_error",
                    0.5,
                    format!("Execution failed: {snippet}"),
                    vec![msg.to_string()],
                );
            }
        }

        if let Some(score) = input.match_score {
            if (0.5..0.8).contains(&score) {
                return ErrorClassification::new(
                    "analysis_error",
                    "incorrect_planning",
                    0.6,
                    "Query structure differs from expected",
                    vec![format!("match_score={score}")],
                );
            }
        }

        ErrorClassification::no_error(0.5, "No clear error pattern detected")
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn schema_linking_diff(submitted_sql: &str, gold_sql: &str) -> Vec<String> {
    let submitted_tables = extract_tables(submitted_sql);
    let gold_tables = extract_tables(gold_sql);

    let missing: Vec<&String> = gold_tables.difference(&submitted_tables).collect();
    let extra: Vec<&String> = submitted_tables.difference(&gold_tables).collect();

    let mut issues = Vec::new();
    if !missing.is_empty() {
        let mut names: Vec<String> = missing.into_iter().cloned().collect();
        names.sort();
        issues.push(format!("Missing tables: {}", names.join(", ")));
    }
    if !extra.is_empty() {
        let mut names: Vec<String> = extra.into_iter().cloned().collect();
        names.sort();
        issues.push(format!("Unexpected tables: {}", names.join(", ")));
    }
    issues
}

fn extract_tables(sql: &str) -> HashSet<String> {
    TABLE_REF
        .captures_iter(sql)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> ClassifierInput<'static> {
        ClassifierInput {
            submitted_sql: "SELECT 1",
            gold_sql: None,
            execution_success: true,
            validation_errors: &[],
            phantom_tables: &[],
            phantom_columns: &[],
            error_message: None,
            match_score: Some(1.0),
        }
    }

    #[test]
    fn success_is_no_error() {
        let classifier = ErrorClassifier::new();
        let result = classifier.classify(&base_input());
        assert_eq!(result.category, "no_error");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn phantom_tables_take_priority_over_everything() {
        let classifier = ErrorClassifier::new();
        let phantom = vec!["customerz".to_string()];
        let input = ClassifierInput {
            execution_success: false,
            phantom_tables: &phantom,
            error_message: Some("syntax error near customerz"),
            match_score: Some(0.0),
            ..base_input()
        };
        let result = classifier.classify(&input);
        assert_eq!(result.category, "schema_error");
        assert_eq!(result.subcategory, "wrong_table");
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn determinism() {
        let classifier = ErrorClassifier::new();
        let errors = vec!["syntax error near foo".to_string()];
        let input = ClassifierInput {
            execution_success: false,
            validation_errors: &errors,
            ..base_input()
        };
        let a = classifier.classify(&input);
        let b = classifier.classify(&input);
        assert_eq!(a, b);
    }

    #[test]
    fn regex_family_ordering_prefers_table_before_syntax() {
        let classifier = ErrorClassifier::new();
        let errors = vec!["table 'widgets' does not exist: syntax error".to_string()];
        let input = ClassifierInput {
            execution_success: false,
            validation_errors: &errors,
            ..base_input()
        };
        let result = classifier.classify(&input);
        assert_eq!(result.subcategory, "wrong_table");
    }

    #[test]
    fn fallback_on_generic_execution_failure() {
        let classifier = ErrorClassifier::new();
        let input = ClassifierInput {
            execution_success: false,
            error_message: Some("something went wrong"),
            match_score: None,
            ..base_input()
        };
        let result = classifier.classify(&input);
        assert_eq!(result.category, "sql_error");
        assert_eq!(result.subcategory, "syntax_error");
        assert_eq!(result.confidence, 0.5);
    }
}
