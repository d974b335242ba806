//! Reference database execution.

pub mod adapter;
pub mod schema;
pub mod sqlite_adapter;

pub use adapter::ExecutionAdapter;
pub use schema::{ColumnInfo, SchemaSnapshot, TableSchema};
pub use sqlite_adapter::SqliteExecutionAdapter;
