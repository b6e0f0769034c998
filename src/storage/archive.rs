//! Raw payload archive
//!
//! Every inbound payload is stored verbatim (as canonical JSON) under
//! `<category>/<name>.json`, independent of whether it maps onto a schema.
//! The name comes from the payload's own timestamp when it carries one, so
//! redelivery of the same message lands on the same key. When two payloads
//! resolve to the same name the last write wins.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info, warn};

use super::{StorageBackend, StorageError};
use crate::database::WriteResult;
use crate::mapping::canonical::to_canonical_string;
use crate::mapping::coerce::parse_timestamp;
use crate::mapping::path::resolve_present;
use crate::payload::RawPayload;

/// Default archive category (key prefix)
pub const DEFAULT_CATEGORY: &str = "Minute";

/// Colon-free timestamp used in object names
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// How archive object names are derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePolicy {
    /// Key prefix, e.g. `Minute`
    pub category: String,
    /// Payload paths holding an embedded timestamp, tried in order
    pub timestamp_paths: Vec<String>,
    /// Payload paths holding an id, tried after the timestamps
    pub id_paths: Vec<String>,
}

impl Default for NamePolicy {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY.to_string(),
            timestamp_paths: vec!["status.timestamp".to_string()],
            id_paths: Vec::new(),
        }
    }
}

impl NamePolicy {
    pub fn with_category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    /// Object key for `raw`, using `now` when the payload names nothing
    pub fn object_key(&self, raw: &RawPayload, now: DateTime<Utc>) -> String {
        let name = self
            .embedded_timestamp(raw)
            .map(|ts| ts.format(KEY_TIMESTAMP_FORMAT).to_string())
            .or_else(|| self.embedded_id(raw))
            .unwrap_or_else(|| now.format(KEY_TIMESTAMP_FORMAT).to_string());
        format!("{}/{}.json", self.category.trim_matches('/'), name)
    }

    fn embedded_timestamp(&self, raw: &RawPayload) -> Option<DateTime<Utc>> {
        self.timestamp_paths.iter().find_map(|path| {
            match resolve_present(raw.value(), path)? {
                Value::String(s) => parse_timestamp(s),
                Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
                _ => None,
            }
        })
    }

    fn embedded_id(&self, raw: &RawPayload) -> Option<String> {
        self.id_paths.iter().find_map(|path| {
            let id = match resolve_present(raw.value(), path)? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let safe: String = id
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            (!safe.is_empty()).then_some(safe)
        })
    }
}

/// Writes raw payloads to a [`StorageBackend`]
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    policy: NamePolicy,
    timeout: Duration,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new(NamePolicy::default(), Duration::from_secs(10))
    }
}

impl ArchiveWriter {
    pub fn new(policy: NamePolicy, timeout: Duration) -> Self {
        Self { policy, timeout }
    }

    pub fn policy(&self) -> &NamePolicy {
        &self.policy
    }

    /// Archive `raw`, falling back to the current time for its name
    pub async fn archive(&self, raw: &RawPayload, storage: &dyn StorageBackend) -> WriteResult {
        self.archive_at(raw, storage, Utc::now()).await
    }

    /// Archive `raw`, falling back to `now` for its name
    pub async fn archive_at(
        &self,
        raw: &RawPayload,
        storage: &dyn StorageBackend,
        now: DateTime<Utc>,
    ) -> WriteResult {
        let key = self.policy.object_key(raw, now);
        let body = to_canonical_string(raw.value());

        let result = match tokio::time::timeout(self.timeout, storage.write_file(&key, body.as_bytes())).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(()) => {
                info!(key = %key, backend = storage.backend_type(), bytes = body.len(), "Payload archived");
                WriteResult::Written { rows_affected: 1 }
            }
            Err(e) if e.is_transient() => {
                error!(key = %key, error = %e, "Archive store unavailable");
                WriteResult::Unavailable(e.to_string())
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Archive write refused");
                WriteResult::Invalid(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorageBackend, StorageResult};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw(value: Value) -> RawPayload {
        RawPayload::new(value).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 7, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_key_from_embedded_timestamp() {
        let payload = raw(json!({"status": {"timestamp": "2024-10-07T08:07:44.594Z"}, "data": []}));
        assert_eq!(
            NamePolicy::default().object_key(&payload, now()),
            "Minute/2024-10-07T08-07-44.json"
        );
    }

    #[test]
    fn test_key_falls_back_to_archive_time() {
        let payload = raw(json!({"uuid": "Qwsogvtv82FCd"}));
        assert_eq!(
            NamePolicy::default().object_key(&payload, now()),
            "Minute/2024-10-07T09-00-00.json"
        );
    }

    #[test]
    fn test_key_from_id_path() {
        let policy = NamePolicy {
            id_paths: vec!["uuid".to_string()],
            ..NamePolicy::with_category("Coins")
        };
        let payload = raw(json!({"uuid": "Qwsogvtv/82FCd"}));
        assert_eq!(policy.object_key(&payload, now()), "Coins/Qwsogvtv_82FCd.json");
    }

    #[test]
    fn test_unparseable_timestamp_is_ignored() {
        let payload = raw(json!({"status": {"timestamp": "soon"}}));
        assert_eq!(
            NamePolicy::default().object_key(&payload, now()),
            "Minute/2024-10-07T09-00-00.json"
        );
    }

    #[tokio::test]
    async fn test_archive_writes_canonical_json() {
        let storage = MemoryStorageBackend::new();
        let payload = raw(json!({"status": {"timestamp": "2024-10-07T08:07:44Z"}, "b": 1, "a": "x"}));

        let result = ArchiveWriter::default().archive_at(&payload, &storage, now()).await;

        assert_eq!(result, WriteResult::Written { rows_affected: 1 });
        let body = storage.read_file("Minute/2024-10-07T08-07-44.json").await.unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"a":"x","b":1,"status":{"timestamp":"2024-10-07T08:07:44Z"}}"#
        );
    }

    #[tokio::test]
    async fn test_archive_does_not_need_a_schema() {
        let storage = MemoryStorageBackend::new();
        let payload = raw(json!({"unexpected": "shape"}));
        let result = ArchiveWriter::default().archive(&payload, &storage).await;
        assert!(result.is_written());
        assert_eq!(storage.len().await, 1);
    }

    struct DownStorage;

    #[async_trait(?Send)]
    impl StorageBackend for DownStorage {
        async fn read_file(&self, path: &str) -> StorageResult<Vec<u8>> {
            Err(StorageError::FileNotFound(path.to_string()))
        }

        async fn write_file(&self, _path: &str, _content: &[u8]) -> StorageResult<()> {
            Err(StorageError::BackendError("503 Slow Down".to_string()))
        }

        async fn list_files(&self, _dir: &str) -> StorageResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn file_exists(&self, _path: &str) -> StorageResult<bool> {
            Ok(false)
        }

        fn backend_type(&self) -> &'static str {
            "down"
        }
    }

    #[tokio::test]
    async fn test_backend_failure_is_unavailable() {
        let result = ArchiveWriter::default()
            .archive(&raw(json!({"a": 1})), &DownStorage)
            .await;
        assert!(result.is_unavailable());
    }
}
