//! Relational persistence
//!
//! This module provides the record store abstraction that supports:
//! - DuckDB: Embedded database for the CLI, local runs and tests
//! - PostgreSQL: Pooled connections for server deployments
//!
//! Stores only ever issue `CREATE TABLE IF NOT EXISTS` and parameterized
//! `INSERT` statements rendered by [`SqlDialect`]. The [`PersistenceWriter`]
//! drives a store for one record and classifies the outcome as a
//! [`WriteResult`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod dialect;
pub mod writer;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBStore;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresStore;

pub use dialect::SqlDialect;
pub use writer::PersistenceWriter;

use crate::mapping::MappedRecord;
use crate::schema::TableSchema;

/// Error type for record store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or the connection dropped
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A constraint (primary key, not-null) rejected the statement
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Any other statement failure
    #[error("Query failed: {0}")]
    Query(String),

    /// The operation did not finish within the configured bound
    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

/// Result type for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of one persistence or archive attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum WriteResult {
    /// Stored; `rows_affected` is 1 for a record insert or an archive put
    Written { rows_affected: u64 },
    /// The record does not conform to its schema, or the store refused the
    /// statement for a reason other than a constraint. Not retried.
    Invalid(String),
    /// A constraint violation, typically a duplicate primary key. Not retried.
    Rejected(String),
    /// The store could not be reached in time. Safe to retry via redelivery.
    Unavailable(String),
}

impl WriteResult {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, WriteResult::Rejected(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, WriteResult::Unavailable(_))
    }

    /// Short label used in logs and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            WriteResult::Written { .. } => "written",
            WriteResult::Invalid(_) => "invalid",
            WriteResult::Rejected(_) => "rejected",
            WriteResult::Unavailable(_) => "unavailable",
        }
    }
}

impl std::fmt::Display for WriteResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteResult::Written { rows_affected } => write!(f, "written ({} rows)", rows_affected),
            WriteResult::Invalid(reason) => write!(f, "invalid: {}", reason),
            WriteResult::Rejected(reason) => write!(f, "rejected: {}", reason),
            WriteResult::Unavailable(reason) => write!(f, "unavailable: {}", reason),
        }
    }
}

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Relational store for mapped records
///
/// Implementations own their connection handling: every call acquires what
/// it needs and releases it before returning, so no connection or
/// transaction outlives a single operation.
#[async_trait(?Send)]
pub trait RecordStore: Send + Sync {
    /// SQL dialect used to render statements for this store
    fn dialect(&self) -> SqlDialect;

    /// Create the schema's table if it does not exist.
    ///
    /// Losing a race against a concurrent creator counts as success.
    async fn ensure_table(&self, schema: &TableSchema) -> StoreResult<()>;

    /// Insert one record with a single parameterized statement
    ///
    /// # Returns
    /// Number of rows affected (1 on success)
    async fn insert(&self, schema: &TableSchema, record: &MappedRecord) -> StoreResult<u64>;

    /// Execute an ad-hoc SQL query and return its rows as JSON
    async fn execute_query(&self, sql: &str) -> StoreResult<QueryResult>;

    /// Check that the store is reachable
    async fn health_check(&self) -> StoreResult<bool>;

    /// Backend type name ("duckdb" or "postgres")
    fn backend_type(&self) -> &'static str;
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn cell_text(row: &QueryRow, column: &str) -> String {
    match row.get(column).unwrap_or(&serde_json::Value::Null) {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = String::new();

    output.push_str(&result.columns.join(","));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .map(|col| match row.get(col).unwrap_or(&serde_json::Value::Null) {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s)
                    if s.contains(',') || s.contains('"') || s.contains('\n') =>
                {
                    format!("\"{}\"", s.replace('"', "\"\""))
                }
                _ => cell_text(row, col),
            })
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &result.rows {
        for (i, col) in result.columns.iter().enumerate() {
            widths[i] = widths[i].max(cell_text(row, col).len());
        }
    }

    let mut output = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect();
    output.push_str(&header.join(" | "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", cell_text(row, col), width = widths[i]))
            .collect();
        output.push_str(&values.join(" | "));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("CSV").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_str("parquet").is_err());
    }

    #[test]
    fn test_format_as_table() {
        let result = QueryResult::new(
            vec!["symbol".to_string(), "price".to_string()],
            vec![
                serde_json::json!({"symbol": "BTC", "price": 63611.48}),
                serde_json::json!({"symbol": "ETH", "price": null}),
            ],
        );

        let output = format_as_table(&result);
        assert!(output.contains("symbol"));
        assert!(output.contains("63611.48"));
        assert!(output.contains("null"));
        assert!(output.ends_with("(2 rows)"));
    }

    #[test]
    fn test_format_as_csv() {
        let result = QueryResult::new(
            vec!["name".to_string(), "tags".to_string()],
            vec![
                serde_json::json!({"name": "Bitcoin", "tags": "mineable"}),
                serde_json::json!({"name": "Ethereum", "tags": "pos, smart-contracts"}),
                serde_json::json!({"name": "Tether", "tags": null}),
            ],
        );

        let output = format_as_csv(&result);
        assert!(output.starts_with("name,tags\n"));
        assert!(output.contains("Bitcoin,mineable"));
        assert!(output.contains("\"pos, smart-contracts\""));
        assert!(output.contains("Tether,\n"));
    }

    #[test]
    fn test_empty_table() {
        let result = QueryResult::new(vec!["id".to_string()], Vec::new());
        assert_eq!(format_query_result(&result, OutputFormat::Table), "(0 rows)");
        assert_eq!(format_query_result(&result, OutputFormat::Json), "[]");
    }

    #[test]
    fn test_write_result_labels() {
        assert!(WriteResult::Written { rows_affected: 1 }.is_written());
        assert!(WriteResult::Rejected("dup".into()).is_rejected());
        assert!(WriteResult::Unavailable("down".into()).is_unavailable());
        assert_eq!(WriteResult::Invalid("x".into()).label(), "invalid");
        assert_eq!(
            WriteResult::Rejected("duplicate key".into()).to_string(),
            "rejected: duplicate key"
        );
    }
}
