//! Reference database schema snapshot and the phantom-identifier
//! tokenizer used to detect hallucinated tables/columns in submitted SQL.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnInfo>,
}

/// A mapping table -> {columns}, as returned by `get_schema()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: HashMap<String, TableSchema>,
}

impl SchemaSnapshot {
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(&table.to_lowercase())
            .map(|t| t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)))
            .unwrap_or(false)
    }

    pub fn any_table_has_column(&self, column: &str) -> bool {
        self.tables
            .values()
            .any(|t| t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)))
    }
}

static FROM_JOIN_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:from|join)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static QUALIFIED_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\b").unwrap());

static SELECT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)select\s+(.*?)\s+from\s").unwrap());

static BARE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

const SQL_KEYWORDS: &[&str] = &[
    "select", "from", "where", "join", "inner", "left", "right", "outer", "on", "and", "or",
    "not", "group", "by", "order", "having", "limit", "offset", "as", "distinct", "count", "sum",
    "avg", "min", "max", "asc", "desc", "null", "is", "in", "like", "between", "case", "when",
    "then", "else", "end",
];

/// Identifiers referenced by `sql` that are absent from `schema`. Tables
/// are taken from `FROM`/`JOIN` clauses; columns are taken from
/// `table.column` qualified references (unambiguous) and from bare
/// identifiers in the select list that match no table's columns (reported
/// against every table they could plausibly belong to). This is a
/// lightweight tokenizer, not a parser.
pub fn find_phantoms(sql: &str, schema: &SchemaSnapshot) -> (Vec<String>, Vec<String>) {
    let mut phantom_tables: Vec<String> = Vec::new();
    let mut seen_tables = HashSet::new();
    for cap in FROM_JOIN_TABLE.captures_iter(sql) {
        let name = cap[1].to_string();
        let lower = name.to_lowercase();
        if !schema.has_table(&lower) && seen_tables.insert(lower) {
            phantom_tables.push(name);
        }
    }

    let mut phantom_columns: Vec<String> = Vec::new();
    let mut seen_columns = HashSet::new();

    for cap in QUALIFIED_COLUMN.captures_iter(sql) {
        let table = &cap[1];
        let column = &cap[2];
        if schema.has_table(table) && !schema.has_column(table, column) {
            let key = format!("{table}.{column}");
            if seen_columns.insert(key.clone()) {
                phantom_columns.push(key);
            }
        }
    }

    if let Some(cap) = SELECT_LIST.captures(sql) {
        let select_list = &cap[1];
        if select_list.trim() != "*" {
            for word in BARE_IDENTIFIER.find_iter(select_list) {
                let ident = word.as_str();
                let lower = ident.to_lowercase();
                if SQL_KEYWORDS.contains(&lower.as_str()) {
                    continue;
                }
                if select_list[..word.start()].ends_with('.') {
                    continue; // already covered by the qualified-column pass
                }
                if !schema.any_table_has_column(ident) {
                    let mut tables: Vec<&String> = schema.tables.keys().collect();
                    tables.sort();
                    if tables.is_empty() {
                        if seen_columns.insert(lower) {
                            phantom_columns.push(ident.to_string());
                        }
                    } else {
                        for table in tables {
                            let dedup_key = format!("{table}.{lower}");
                            if seen_columns.insert(dedup_key) {
                                phantom_columns.push(format!("{table}.{ident}"));
                            }
                        }
                    }
                }
            }
        }
    }

    (phantom_tables, phantom_columns)
}

/// All tables named in `FROM`/`JOIN` clauses, in first-seen order,
/// regardless of whether they exist in the schema.
pub fn referenced_tables(sql: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    FROM_JOIN_TABLE
        .captures_iter(sql)
        .map(|cap| cap[1].to_string())
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}
