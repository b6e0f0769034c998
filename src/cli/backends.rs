//! Construction of stores from configuration

use std::path::Path;

use tracing::{info, warn};

use crate::cli::error::CliError;
use crate::config::{ArchiveBackendType, DatabaseBackendType, IngestConfig};
use crate::database::{RecordStore, SqlDialect};
use crate::storage::{MemoryStorageBackend, StorageBackend};

/// Runtime for one command invocation
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

/// SQL dialect of a configured backend
pub fn dialect_for(backend: DatabaseBackendType) -> SqlDialect {
    match backend {
        DatabaseBackendType::DuckDB => SqlDialect::DuckDb,
        DatabaseBackendType::Postgres => SqlDialect::Postgres,
    }
}

/// Open the configured record store
///
/// Must be called from inside a runtime; the PostgreSQL pool binds to it.
pub fn open_store(config: &IngestConfig, dir: &Path) -> Result<Box<dyn RecordStore>, CliError> {
    match config.database.backend {
        DatabaseBackendType::DuckDB => {
            #[cfg(feature = "duckdb-backend")]
            {
                let db_path = config.get_duckdb_path(dir);
                info!(path = %db_path.display(), "Opening DuckDB store");
                let store = crate::database::DuckDBStore::new(&db_path)?;
                Ok(Box::new(store))
            }
            #[cfg(not(feature = "duckdb-backend"))]
            {
                let _ = dir;
                Err(CliError::FeatureDisabled("DuckDB", "duckdb-backend"))
            }
        }
        DatabaseBackendType::Postgres => {
            #[cfg(feature = "postgres-backend")]
            {
                let conn_str = config.get_postgres_connection_string().ok_or_else(|| {
                    CliError::InvalidArgument(
                        "PostgreSQL connection string not configured".to_string(),
                    )
                })?;
                let store =
                    crate::database::PostgresStore::new(conn_str, config.postgres.pool_size)?;
                info!(url = %store.connection_string_masked(), "Opening PostgreSQL store");
                Ok(Box::new(store))
            }
            #[cfg(not(feature = "postgres-backend"))]
            {
                Err(CliError::FeatureDisabled("PostgreSQL", "postgres-backend"))
            }
        }
    }
}

/// Open the configured archive store
pub async fn open_storage(
    config: &IngestConfig,
    dir: &Path,
) -> Result<Box<dyn StorageBackend>, CliError> {
    match config.archive.backend {
        ArchiveBackendType::Filesystem => {
            let root = config.get_archive_root(dir);
            info!(root = %root.display(), "Using filesystem archive");
            Ok(Box::new(crate::storage::FileSystemStorageBackend::new(root)))
        }
        ArchiveBackendType::Memory => {
            warn!("Using in-memory archive; archived payloads are discarded on exit");
            Ok(Box::new(MemoryStorageBackend::new()))
        }
        ArchiveBackendType::S3 => {
            #[cfg(feature = "s3")]
            {
                let bucket = config.archive.bucket.clone().ok_or_else(|| {
                    CliError::InvalidArgument("S3 archive bucket not configured".to_string())
                })?;
                info!(bucket = %bucket, "Using S3 archive");
                Ok(Box::new(crate::storage::S3StorageBackend::from_env(bucket).await))
            }
            #[cfg(not(feature = "s3"))]
            {
                Err(CliError::FeatureDisabled("S3", "s3"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_archive() {
        let mut config = IngestConfig::new();
        config.archive.backend = ArchiveBackendType::Memory;
        let storage = open_storage(&config, Path::new(".")).await.unwrap();
        assert_eq!(storage.backend_type(), "memory");
    }

    #[tokio::test]
    async fn test_filesystem_archive_under_config_dir() {
        let dir = tempdir().unwrap();
        let storage = open_storage(&IngestConfig::new(), dir.path()).await.unwrap();
        storage.write_file("Minute/a.json", b"{}").await.unwrap();
        assert!(dir.path().join("archive/Minute/a.json").exists());
    }

    #[cfg(feature = "duckdb-backend")]
    #[test]
    fn test_open_duckdb_store() {
        let dir = tempdir().unwrap();
        let store = open_store(&IngestConfig::new(), dir.path()).unwrap();
        assert_eq!(store.dialect(), SqlDialect::DuckDb);
        assert!(dir.path().join("coins.duckdb").exists());
    }

    #[test]
    fn test_dialect_for_backend() {
        assert_eq!(dialect_for(DatabaseBackendType::Postgres), SqlDialect::Postgres);
        assert_eq!(dialect_for(DatabaseBackendType::DuckDB), SqlDialect::DuckDb);
    }
}
