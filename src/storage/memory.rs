//! In-memory storage backend

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{StorageBackend, StorageError, StorageResult, check_key, dir_prefix};

/// Process-local object store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorageBackend {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// All keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait(?Send)]
impl StorageBackend for MemoryStorageBackend {
    async fn read_file(&self, path: &str) -> StorageResult<Vec<u8>> {
        check_key(path)?;
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(path.to_string()))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        check_key(path)?;
        self.objects
            .write()
            .await
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>> {
        let prefix = dir_prefix(dir);
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| {
                key.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect())
    }

    async fn file_exists(&self, path: &str) -> StorageResult<bool> {
        check_key(path)?;
        Ok(self.objects.read().await.contains_key(path))
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let storage = MemoryStorageBackend::new();
        storage.write_file("Minute/a.json", b"{}").await.unwrap();
        assert_eq!(storage.read_file("Minute/a.json").await.unwrap(), b"{}");
        assert!(storage.file_exists("Minute/a.json").await.unwrap());
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let storage = MemoryStorageBackend::new();
        storage.write_file("Minute/a.json", b"1").await.unwrap();
        storage.write_file("Minute/a.json", b"2").await.unwrap();
        assert_eq!(storage.read_file("Minute/a.json").await.unwrap(), b"2");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let storage = MemoryStorageBackend::new();
        let err = storage.read_file("Minute/none.json").await.unwrap_err();
        assert_eq!(err, StorageError::FileNotFound("Minute/none.json".into()));
    }

    #[tokio::test]
    async fn test_list_is_not_recursive() {
        let storage = MemoryStorageBackend::new();
        storage.write_file("Minute/b.json", b"{}").await.unwrap();
        storage.write_file("Minute/a.json", b"{}").await.unwrap();
        storage.write_file("Minute/old/c.json", b"{}").await.unwrap();
        storage.write_file("Month/d.json", b"{}").await.unwrap();
        assert_eq!(
            storage.list_files("Minute").await.unwrap(),
            vec!["Minute/a.json", "Minute/b.json"]
        );
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let storage = MemoryStorageBackend::new();
        let err = storage.write_file("../a.json", b"{}").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }
}
