//! SQLite-backed execution adapter.
//!
//! A pool held behind an `Arc`, `anyhow::Context`-annotated error
//! propagation, and a cached schema snapshot refreshed on demand. The
//! reference database is an embedded SQLite instance loaded once per
//! assessment run from a fixture script.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as SqlxRow, TypeInfo, ValueRef};
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use super::adapter::ExecutionAdapter;
use super::schema::{find_phantoms, referenced_tables, ColumnInfo, SchemaSnapshot, TableSchema};
use crate::types::{ExecutionResult, Row};

const MAX_ROWS: usize = 1000;

pub struct SqliteExecutionAdapter {
    pool: SqlitePool,
    schema: RwLock<Option<Arc<SchemaSnapshot>>>,
}

impl SqliteExecutionAdapter {
    /// Opens an in-memory SQLite database and applies `fixture_sql` (the
    /// reference schema + seed data for the selected `SchemaSelector`).
    pub async fn open_in_memory(fixture_sql: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect("sqlite::memory:")
            .await
            .context("opening in-memory reference database")?;

        for statement in fixture_sql.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement)
                .execute(&pool)
                .await
                .with_context(|| format!("applying fixture statement: {statement}"))?;
        }

        Ok(Self {
            pool,
            schema: RwLock::new(None),
        })
    }

    async fn load_schema(&self) -> anyhow::Result<SchemaSnapshot> {
        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
                .fetch_all(&self.pool)
                .await
                .context("listing reference database tables")?;

        let mut snapshot = SchemaSnapshot::default();
        for (table_name,) in tables {
            let columns: Vec<(i64, String, String, i64, Option<String>, i64)> =
                sqlx::query_as(&format!("PRAGMA table_info({table_name})"))
                    .fetch_all(&self.pool)
                    .await
                    .with_context(|| format!("reading schema for table '{table_name}'"))?;

            let table_schema = TableSchema {
                columns: columns
                    .into_iter()
                    .map(|(_, name, data_type, ..)| ColumnInfo { name, data_type })
                    .collect(),
            };
            snapshot.tables.insert(table_name.to_lowercase(), table_schema);
        }

        Ok(snapshot)
    }

    fn query_type(sql: &str) -> String {
        sql.trim_start()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase()
    }

    fn row_to_map(row: &SqliteRow) -> anyhow::Result<Row> {
        let mut map = Row::new();
        for (index, column) in row.columns().iter().enumerate() {
            let raw = row.try_get_raw(index)?;
            let value = if raw.is_null() {
                Value::Null
            } else {
                match column.type_info().name() {
                    "INTEGER" | "BIGINT" => row
                        .try_get::<i64, _>(index)
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                    "REAL" | "DOUBLE" | "FLOAT" => row
                        .try_get::<f64, _>(index)
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                    _ => row
                        .try_get::<String, _>(index)
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                }
            };
            map.insert(column.name().to_string(), value);
        }
        Ok(map)
    }
}

#[async_trait::async_trait]
impl ExecutionAdapter for SqliteExecutionAdapter {
    #[instrument(skip(self, sql))]
    async fn execute(&self, sql: &str) -> ExecutionResult {
        let schema = match self.get_schema().await {
            Ok(schema) => schema,
            Err(err) => {
                warn!(%err, "failed to load reference schema before execution");
                return ExecutionResult::failed(format!("schema unavailable: {err}"));
            }
        };

        let (phantom_tables, phantom_columns) = find_phantoms(sql, &schema);
        let tables_accessed = referenced_tables(sql);

        if !phantom_tables.is_empty() {
            let mut result = ExecutionResult::failed(format!(
                "references unknown table(s): {}",
                phantom_tables.join(", ")
            ));
            result.validation_errors = phantom_tables
                .iter()
                .map(|t| format!("no such table: {t}"))
                .collect();
            result.phantom_tables = phantom_tables;
            result.phantom_columns = phantom_columns;
            result.tables_accessed = tables_accessed;
            result.query_type = Some(Self::query_type(sql));
            return result;
        }

        let started = Instant::now();
        let rows = sqlx::query(sql).fetch_all(&self.pool).await;
        let execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        match rows {
            Ok(rows) => {
                let truncated = rows.len() > MAX_ROWS;
                let mut columns = Vec::new();
                let mut mapped_rows = Vec::with_capacity(rows.len().min(MAX_ROWS));
                for row in rows.iter().take(MAX_ROWS) {
                    if columns.is_empty() {
                        columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    match Self::row_to_map(row) {
                        Ok(map) => mapped_rows.push(map),
                        Err(err) => {
                            return ExecutionResult::failed(format!("failed to decode row: {err}"))
                        }
                    }
                }

                let mut validation_warnings = Vec::new();
                if truncated {
                    validation_warnings.push(format!("result truncated to {MAX_ROWS} rows"));
                }

                let mut insights = Vec::new();
                if mapped_rows.is_empty() {
                    insights.push("Query returned no results".to_string());
                }
                if truncated {
                    insights.push("Result set was truncated".to_string());
                }

                ExecutionResult {
                    success: true,
                    rows_returned: mapped_rows.len(),
                    rows: mapped_rows,
                    columns,
                    execution_time_ms,
                    error: None,
                    is_valid: true,
                    validation_errors: Vec::new(),
                    validation_warnings,
                    query_type: Some(Self::query_type(sql)),
                    tables_accessed,
                    columns_accessed: Vec::new(),
                    phantom_tables,
                    phantom_columns,
                    insights,
                    summary: String::new(),
                }
            }
            Err(err) => {
                let message = err.to_string();
                let mut result = ExecutionResult::failed(message.clone());
                result.validation_errors = vec![message];
                result.execution_time_ms = execution_time_ms;
                result.tables_accessed = tables_accessed;
                result.phantom_tables = phantom_tables;
                result.phantom_columns = phantom_columns;
                result.query_type = Some(Self::query_type(sql));
                result
            }
        }
    }

    async fn get_schema(&self) -> anyhow::Result<SchemaSnapshot> {
        if let Some(cached) = self.schema.read().await.as_ref() {
            return Ok((**cached).clone());
        }
        let snapshot = self.load_schema().await?;
        *self.schema.write().await = Some(Arc::new(snapshot.clone()));
        Ok(snapshot)
    }

    async fn refresh_schema(&self) {
        *self.schema.write().await = None;
    }
}
