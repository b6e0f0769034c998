//! Blob storage for archived payloads
//!
//! Object keys are `/`-separated paths relative to the backend root, e.g.
//! `Minute/2024-10-07T08-07-44.json`. Backends:
//! - [`MemoryStorageBackend`]: process-local, for tests and dry runs
//! - [`FileSystemStorageBackend`] (`native-fs`): a directory tree
//! - [`S3StorageBackend`] (`s3`): an S3 bucket

use async_trait::async_trait;

pub mod archive;
pub mod consolidate;
pub mod memory;

#[cfg(feature = "native-fs")]
pub mod filesystem;

#[cfg(feature = "s3")]
pub mod s3;

pub use archive::{ArchiveWriter, NamePolicy};
pub use consolidate::{ConsolidationReport, consolidate_month, previous_month};
pub use memory::MemoryStorageBackend;

#[cfg(feature = "native-fs")]
pub use filesystem::FileSystemStorageBackend;

#[cfg(feature = "s3")]
pub use s3::S3StorageBackend;

/// Error type for storage operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No object under this key
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The key is not a safe relative object path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Local I/O failure
    #[error("IO error: {0}")]
    IoError(String),

    /// Remote store failure (network, credentials, service error)
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Content could not be encoded or decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The operation did not finish within the configured bound
    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

impl StorageError {
    /// Whether retrying the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::IoError(_) | StorageError::BackendError(_) | StorageError::Timeout(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object store used by the archive writer and consolidation
#[async_trait(?Send)]
pub trait StorageBackend: Send + Sync {
    /// Read an object
    async fn read_file(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Create or replace an object
    async fn write_file(&self, path: &str, content: &[u8]) -> StorageResult<()>;

    /// Keys of the objects directly under `dir` (not recursive), sorted
    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>>;

    /// Whether an object exists under `path`
    async fn file_exists(&self, path: &str) -> StorageResult<bool>;

    /// Backend type name ("memory", "filesystem" or "s3")
    fn backend_type(&self) -> &'static str;
}

/// Content type for an object key, from its extension
pub fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}

/// Normalise a directory argument to a key prefix (`Minute` -> `Minute/`)
pub(crate) fn dir_prefix(dir: &str) -> String {
    let trimmed = dir.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Validate an object key, mapping failures to [`StorageError::InvalidPath`]
pub(crate) fn check_key(path: &str) -> StorageResult<()> {
    crate::validation::validate_object_key(path)
        .map_err(|e| StorageError::InvalidPath(format!("{}: {}", path, e)))
}
