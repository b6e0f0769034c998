//! coin-ingest - schema-driven ingestion of crypto market payloads
//!
//! Provides:
//! - Declarative table schemas and a registry of them
//! - A deterministic field mapper from raw JSON to typed records
//! - Idempotent persistence through pluggable record stores (DuckDB, PostgreSQL)
//! - Raw payload archiving through pluggable blob stores (memory, filesystem, S3)
//! - Per-message orchestration with ack/redeliver dispositions
//! - Monthly consolidation of the archive

pub mod config;
pub mod database;
pub mod mapping;
pub mod payload;
pub mod pipeline;
pub mod schema;
pub mod storage;
pub mod validation;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use config::{ConfigError, IngestConfig};
pub use database::{
    PersistenceWriter, RecordStore, SqlDialect, StoreError, StoreResult, WriteResult,
};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDBStore;
#[cfg(feature = "postgres-backend")]
pub use database::PostgresStore;
pub use mapping::{MappedRecord, MappedValue, MappingError, map, map_records};
pub use payload::{PayloadError, RawPayload};
pub use pipeline::{
    Disposition, MessageOutcome, PersistError, Pipeline, PipelineError, decode_push_message,
};
pub use schema::{
    FieldSource, FieldSpec, SchemaError, SchemaRegistry, SemanticType, TableSchema,
};
#[cfg(feature = "native-fs")]
pub use storage::FileSystemStorageBackend;
#[cfg(feature = "s3")]
pub use storage::S3StorageBackend;
pub use storage::{
    ArchiveWriter, MemoryStorageBackend, NamePolicy, StorageBackend, StorageError,
    consolidate_month,
};
