//! DuckDB record store
//!
//! Embedded store for the CLI, local runs and tests. Supports both
//! file-based persistence and in-memory mode.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use duckdb::types::{TimeUnit, Value, ValueRef};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{QueryResult, RecordStore, SqlDialect, StoreError, StoreResult};
use crate::mapping::{MappedRecord, MappedValue};
use crate::schema::TableSchema;

/// DuckDB record store
pub struct DuckDBStore {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBStore {
    /// Open (or create) a file-based database
    ///
    /// # Arguments
    /// * `db_path` - Path to the DuckDB database file
    pub fn new(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path)
            .map_err(|e| StoreError::Connection(format!("Failed to open DuckDB: {}", e)))?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory database
    ///
    /// Useful for testing or dry runs where persistence is not needed.
    pub fn in_memory() -> StoreResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            StoreError::Connection(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| StoreError::Connection(format!("Lock error: {}", e)))
    }

    fn classify(e: duckdb::Error) -> StoreError {
        let message = e.to_string();
        if message.contains("Constraint Error") || message.contains("Duplicate key") {
            StoreError::Constraint(message)
        } else {
            StoreError::Query(message)
        }
    }

    /// Convert a mapped value to a DuckDB bind parameter
    fn to_duckdb_value(value: &MappedValue) -> Value {
        match value {
            MappedValue::Null => Value::Null,
            MappedValue::Integer(i) => Value::BigInt(*i),
            MappedValue::Decimal(f) => Value::Double(*f),
            MappedValue::Boolean(b) => Value::Boolean(*b),
            MappedValue::Text(s) | MappedValue::Json(s) => Value::Text(s.clone()),
            MappedValue::Timestamp(ts) => {
                Value::Timestamp(TimeUnit::Microsecond, ts.timestamp_micros())
            }
        }
    }

    /// Convert a DuckDB row to a JSON value
    fn row_to_json(row: &duckdb::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            let value = match row.get_ref(i) {
                Ok(value_ref) => Self::value_ref_to_json(value_ref),
                Err(_) => serde_json::Value::Null,
            };
            map.insert(col_name.clone(), value);
        }

        serde_json::Value::Object(map)
    }

    /// Convert a DuckDB ValueRef to a JSON value
    fn value_ref_to_json(value: ValueRef) -> serde_json::Value {
        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Boolean(b) => serde_json::Value::Bool(b),
            ValueRef::TinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::SmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Int(i) => serde_json::Value::Number(i.into()),
            ValueRef::BigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::HugeInt(i) => {
                // i128 may not fit in a JSON number
                serde_json::Value::String(i.to_string())
            }
            ValueRef::UTinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::USmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UBigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Float(f) => float_to_json(f as f64),
            ValueRef::Double(f) => float_to_json(f),
            ValueRef::Decimal(d) => {
                let text = d.to_string();
                text.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::String(text))
            }
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            ValueRef::Blob(bytes) => {
                use base64::Engine;
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ValueRef::Timestamp(unit, raw) => {
                let micros = match unit {
                    TimeUnit::Second => raw.saturating_mul(1_000_000),
                    TimeUnit::Millisecond => raw.saturating_mul(1_000),
                    TimeUnit::Microsecond => raw,
                    TimeUnit::Nanosecond => raw / 1_000,
                };
                DateTime::from_timestamp_micros(micros)
                    .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                    .map(serde_json::Value::String)
                    .unwrap_or(serde_json::Value::Null)
            }
            other => serde_json::Value::String(format!("{:?}", other)),
        }
    }
}

fn created_concurrently(e: &duckdb::Error) -> bool {
    e.to_string().contains("already exists")
}

fn float_to_json(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

#[async_trait(?Send)]
impl RecordStore for DuckDBStore {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::DuckDb
    }

    async fn ensure_table(&self, schema: &TableSchema) -> StoreResult<()> {
        let sql = self.dialect().create_table_sql(schema);
        let conn = self.lock()?;
        match conn.execute_batch(&sql) {
            Ok(()) => Ok(()),
            Err(e) if created_concurrently(&e) => {
                debug!(table = schema.table(), "Table created concurrently");
                Ok(())
            }
            Err(e) => Err(Self::classify(e)),
        }
    }

    async fn insert(&self, schema: &TableSchema, record: &MappedRecord) -> StoreResult<u64> {
        let sql = self.dialect().insert_sql(schema);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(Self::classify)?;
        let params = record.values().map(Self::to_duckdb_value);
        let rows = stmt
            .execute(duckdb::params_from_iter(params))
            .map_err(Self::classify)?;
        Ok(rows as u64)
    }

    async fn execute_query(&self, sql: &str) -> StoreResult<QueryResult> {
        let start = std::time::Instant::now();
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StoreError::Query(format!("Prepare failed: {}", e)))?;

        // In DuckDB 1.4+, we need to execute the query first, then get columns
        let mut result_rows = stmt
            .query([])
            .map_err(|e| StoreError::Query(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| StoreError::Query(format!("Row fetch error: {}", e)))?
        {
            rows.push(Self::row_to_json(row, &columns));
        }

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let result = self.execute_query("SELECT 1 AS healthy").await?;
        Ok(!result.rows.is_empty())
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }
}
