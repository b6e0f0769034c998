//! Persistence writer
//!
//! Writes one [`MappedRecord`] through a [`RecordStore`] and folds every
//! failure into a [`WriteResult`]. The writer never panics and never retries:
//! a duplicate key is `Rejected`, an unreachable or slow store is
//! `Unavailable`, and the caller decides what to do with the message.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::{RecordStore, StoreError, WriteResult};
use crate::mapping::MappedRecord;
use crate::schema::TableSchema;

/// Default bound on every store call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Writes mapped records, creating destination tables on first use.
///
/// The ensured-table cache is keyed by store and schema id, so one writer can
/// serve several stores. A store is identified by its address, so a writer
/// should not outlive the stores it has written to.
#[derive(Debug)]
pub struct PersistenceWriter {
    timeout: Duration,
    ensured: Mutex<HashSet<EnsuredKey>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EnsuredKey {
    store: usize,
    schema_id: String,
}

impl EnsuredKey {
    fn new(store: &dyn RecordStore, schema_id: &str) -> Self {
        Self {
            store: store as *const dyn RecordStore as *const () as usize,
            schema_id: schema_id.to_string(),
        }
    }
}

impl Default for PersistenceWriter {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl PersistenceWriter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ensured: Mutex::new(HashSet::new()),
        }
    }

    /// Bound applied to each store call
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether this writer has ensured the table for `schema_id` on `store`
    pub fn is_ensured(&self, store: &dyn RecordStore, schema_id: &str) -> bool {
        let key = EnsuredKey::new(store, schema_id);
        self.ensured
            .lock()
            .map(|set| set.contains(&key))
            .unwrap_or(false)
    }

    /// Persist one record.
    ///
    /// Ensures the table exists (skipped once it has succeeded for this
    /// schema on this store), then runs exactly one parameterized insert.
    /// Concurrent first writes may both ensure the table; stores tolerate
    /// a table that appeared in between.
    pub async fn write(
        &self,
        record: &MappedRecord,
        schema: &TableSchema,
        store: &dyn RecordStore,
    ) -> WriteResult {
        if let Err(reason) = check_conforms(record, schema) {
            warn!(schema = schema.id(), %reason, "Refusing to write non-conformant record");
            return WriteResult::Invalid(reason);
        }

        if !self.is_ensured(store, schema.id()) {
            match self.bounded(store.ensure_table(schema)).await {
                Ok(()) => {
                    debug!(schema = schema.id(), table = schema.table(), "Table ensured");
                    if let Ok(mut set) = self.ensured.lock() {
                        set.insert(EnsuredKey::new(store, schema.id()));
                    }
                }
                Err(e) => return self.classify(schema, e),
            }
        }

        match self.bounded(store.insert(schema, record)).await {
            Ok(rows_affected) => {
                info!(
                    schema = schema.id(),
                    table = schema.table(),
                    backend = store.backend_type(),
                    rows_affected,
                    "Record written"
                );
                WriteResult::Written { rows_affected }
            }
            Err(e) => self.classify(schema, e),
        }
    }

    async fn bounded<T>(
        &self,
        operation: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    fn classify(&self, schema: &TableSchema, err: StoreError) -> WriteResult {
        match err {
            StoreError::Constraint(reason) => {
                warn!(schema = schema.id(), table = schema.table(), %reason, "Record rejected");
                WriteResult::Rejected(reason)
            }
            StoreError::Query(reason) => {
                warn!(schema = schema.id(), table = schema.table(), %reason, "Statement failed");
                WriteResult::Invalid(reason)
            }
            e @ (StoreError::Connection(_) | StoreError::Timeout(_)) => {
                error!(schema = schema.id(), table = schema.table(), error = %e, "Store unavailable");
                WriteResult::Unavailable(e.to_string())
            }
        }
    }
}

fn check_conforms(record: &MappedRecord, schema: &TableSchema) -> Result<(), String> {
    if record.schema_id() != schema.id() {
        return Err(format!(
            "record was mapped with schema {}, not {}",
            record.schema_id(),
            schema.id()
        ));
    }
    if record.len() != schema.fields().len() {
        return Err(format!(
            "record has {} columns, schema {} declares {}",
            record.len(),
            schema.id(),
            schema.fields().len()
        ));
    }
    for ((name, value), field) in record.columns().iter().zip(schema.fields()) {
        if *name != field.name {
            return Err(format!("column '{}' found where '{}' was expected", name, field.name));
        }
        if !value.conforms_to(field.semantic_type, field.nullable) {
            return Err(format!(
                "column '{}' does not hold a {} value",
                field.name, field.semantic_type
            ));
        }
    }
    Ok(())
}
