//! Filesystem storage backend
//!
//! Objects are files under a root directory; key segments become
//! subdirectories, created on demand.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{StorageBackend, StorageError, StorageResult, check_key, dir_prefix};

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FileSystemStorageBackend {
    root: PathBuf,
}

impl FileSystemStorageBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        check_key(path)?;
        Ok(path.split('/').fold(self.root.clone(), |acc, segment| acc.join(segment)))
    }
}

fn io_error(path: &str, e: std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::FileNotFound(path.to_string()),
        _ => StorageError::IoError(format!("{}: {}", path, e)),
    }
}

#[async_trait(?Send)]
impl StorageBackend for FileSystemStorageBackend {
    async fn read_file(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|e| io_error(path, e))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>> {
        let prefix = dir_prefix(dir);
        let full = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix.trim_end_matches('/'))?
        };

        let mut entries = match tokio::fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(dir, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file && let Some(name) = entry.file_name().to_str() {
                keys.push(format!("{}{}", prefix, name));
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn file_exists(&self, path: &str) -> StorageResult<bool> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| io_error(path, e))
    }

    fn backend_type(&self) -> &'static str {
        "filesystem"
    }
}
