//! PostgreSQL record store
//!
//! Provides a PostgreSQL store for server deployments. Uses connection
//! pooling via deadpool-postgres; every operation checks a client out of
//! the pool and returns it when the call completes.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime};
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;
use tracing::debug;

use super::{QueryResult, RecordStore, SqlDialect, StoreError, StoreResult};
use crate::mapping::{MappedRecord, MappedValue};
use crate::schema::{SemanticType, TableSchema};

/// Default number of pooled connections
pub const DEFAULT_POOL_SIZE: usize = 4;

// duplicate_table, unique_violation (concurrent CREATE TABLE IF NOT EXISTS
// can fail on the catalog's unique index)
const ALREADY_EXISTS: &[&str] = &["42P07", "23505"];

type BoxedParam = Box<dyn ToSql + Sync + Send>;

fn created_concurrently(sqlstate: &str) -> bool {
    ALREADY_EXISTS.contains(&sqlstate)
}

/// PostgreSQL record store
pub struct PostgresStore {
    /// Connection string
    connection_string: String,
    pool: Pool,
}

impl PostgresStore {
    /// Create a pooled store
    ///
    /// Connections are opened lazily, so this succeeds even when the server
    /// is down; the first operation reports the failure.
    ///
    /// # Arguments
    /// * `connection_string` - PostgreSQL connection string
    /// * `pool_size` - Maximum number of pooled connections
    pub fn new(connection_string: &str, pool_size: usize) -> StoreResult<Self> {
        let config = Config {
            url: Some(connection_string.to_string()),
            pool: Some(PoolConfig::new(pool_size.max(1))),
            ..Default::default()
        };
        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Connection(format!("Failed to create pool: {}", e)))?;

        Ok(Self {
            connection_string: connection_string.to_string(),
            pool,
        })
    }

    /// Get the connection string (masked for security)
    pub fn connection_string_masked(&self) -> String {
        mask_password(&self.connection_string)
    }

    async fn client(&self) -> StoreResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to get connection: {}", e)))
    }

    fn classify(e: tokio_postgres::Error) -> StoreError {
        if e.is_closed() {
            return StoreError::Connection(e.to_string());
        }
        match e.as_db_error() {
            Some(db) if db.code().code().starts_with("23") => {
                StoreError::Constraint(db.message().to_string())
            }
            Some(db) => StoreError::Query(format!("{} ({})", db.message(), db.code().code())),
            None => StoreError::Connection(e.to_string()),
        }
    }

    fn to_param(value: &MappedValue, semantic_type: SemanticType) -> BoxedParam {
        match value {
            MappedValue::Null => match semantic_type {
                SemanticType::Integer => Box::new(None::<i64>),
                SemanticType::Decimal => Box::new(None::<f64>),
                SemanticType::Boolean => Box::new(None::<bool>),
                SemanticType::Timestamp => Box::new(None::<DateTime<Utc>>),
                SemanticType::String | SemanticType::Json => Box::new(None::<String>),
            },
            MappedValue::Integer(i) => Box::new(*i),
            MappedValue::Decimal(f) => Box::new(*f),
            MappedValue::Boolean(b) => Box::new(*b),
            MappedValue::Text(s) | MappedValue::Json(s) => Box::new(s.clone()),
            MappedValue::Timestamp(ts) => Box::new(*ts),
        }
    }

    /// Convert a PostgreSQL row to a JSON value
    fn row_to_json(row: &tokio_postgres::Row) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (i, column) in row.columns().iter().enumerate() {
            map.insert(column.name().to_string(), Self::get_column_value(row, i));
        }
        serde_json::Value::Object(map)
    }

    /// Get a column value as JSON
    fn get_column_value(row: &tokio_postgres::Row, idx: usize) -> serde_json::Value {
        if let Ok(v) = row.try_get::<_, Option<String>>(idx) {
            return v
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<i64>>(idx) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<i32>>(idx) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<bool>>(idx) {
            return v
                .map(serde_json::Value::Bool)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<f64>>(idx) {
            return v
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<DateTime<Utc>>>(idx) {
            return v
                .map(|ts| serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
                .unwrap_or(serde_json::Value::Null);
        }

        serde_json::Value::Null
    }
}

fn mask_password(connection_string: &str) -> String {
    let start = connection_string.find("://").map(|i| i + 3).unwrap_or(0);
    if let Some(at_pos) = connection_string[start..].find('@').map(|i| i + start)
        && let Some(colon_pos) = connection_string[start..at_pos].find(':').map(|i| i + start)
    {
        let prefix = &connection_string[..colon_pos + 1];
        let suffix = &connection_string[at_pos..];
        return format!("{}****{}", prefix, suffix);
    }
    connection_string.to_string()
}

#[async_trait(?Send)]
impl RecordStore for PostgresStore {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    async fn ensure_table(&self, schema: &TableSchema) -> StoreResult<()> {
        let sql = self.dialect().create_table_sql(schema);
        let client = self.client().await?;
        match client.batch_execute(&sql).await {
            Ok(()) => Ok(()),
            Err(e) if e.code().is_some_and(|code| created_concurrently(code.code())) => {
                debug!(table = schema.table(), "Table created concurrently");
                Ok(())
            }
            Err(e) => Err(Self::classify(e)),
        }
    }

    async fn insert(&self, schema: &TableSchema, record: &MappedRecord) -> StoreResult<u64> {
        let sql = self.dialect().insert_sql(schema);
        let params: Vec<BoxedParam> = record
            .values()
            .zip(schema.fields())
            .map(|(value, field)| Self::to_param(value, field.semantic_type))
            .collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let client = self.client().await?;
        let statement = client.prepare_cached(&sql).await.map_err(Self::classify)?;
        client
            .execute(&statement, &refs)
            .await
            .map_err(Self::classify)
    }

    async fn execute_query(&self, sql: &str) -> StoreResult<QueryResult> {
        let start = std::time::Instant::now();
        let client = self.client().await?;

        let rows = client.query(sql, &[]).await.map_err(Self::classify)?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        Ok(QueryResult {
            columns,
            rows: rows.iter().map(Self::row_to_json).collect(),
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let result = self.execute_query("SELECT 1 AS healthy").await?;
        Ok(!result.rows.is_empty())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
