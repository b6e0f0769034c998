//! S3 storage backend
//!
//! Credentials and region come from the standard AWS provider chain
//! (environment, profile, instance metadata).

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use super::{
    StorageBackend, StorageError, StorageResult, check_key, content_type_for, dir_prefix,
};

/// Object store backed by one S3 bucket
#[derive(Debug, Clone)]
pub struct S3StorageBackend {
    client: Client,
    bucket: String,
}

impl S3StorageBackend {
    /// Build a client from the default AWS configuration
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket)
    }

    /// Use an already-configured client
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

// Listing prefix for a directory argument, validated like an object key
fn list_prefix(dir: &str) -> StorageResult<String> {
    let prefix = dir_prefix(dir);
    if !prefix.is_empty() {
        check_key(prefix.trim_end_matches('/'))?;
    }
    Ok(prefix)
}

#[async_trait(?Send)]
impl StorageBackend for S3StorageBackend {
    async fn read_file(&self, path: &str) -> StorageResult<Vec<u8>> {
        check_key(path)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::FileNotFound(path.to_string())
                } else {
                    StorageError::BackendError(format!("get {}: {}", path, service_error))
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::BackendError(format!("read {}: {}", path, e)))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        check_key(path)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type_for(path))
            .body(ByteStream::from(content.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::BackendError(format!("put {}: {}", path, e)))?;
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>> {
        let prefix = list_prefix(dir)?;
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .delimiter("/")
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page =
                page.map_err(|e| StorageError::BackendError(format!("list {}: {}", dir, e)))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(str::to_string),
            );
        }
        keys.sort();
        Ok(keys)
    }

    async fn file_exists(&self, path: &str) -> StorageResult<bool> {
        check_key(path)?;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::BackendError(format!(
                        "head {}: {}",
                        path, service_error
                    )))
                }
            }
        }
    }

    fn backend_type(&self) -> &'static str {
        "s3"
    }
}
