//! Monthly consolidation
//!
//! Merges a month's archived payloads into a single
//! `<target>/<YYYY-MM>-consolidated.json` object of the form
//! `{"data": [payload, ...]}`, ordered by source key.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{StorageBackend, StorageError, StorageResult};

/// Default prefix the consolidated objects are written under
pub const DEFAULT_TARGET: &str = "Month";

/// Outcome of one consolidation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Month consolidated, `YYYY-MM`
    pub month: String,
    /// Number of source objects merged
    pub merged: usize,
    /// Key written, or `None` when there was nothing to merge
    pub output_key: Option<String>,
}

/// Month before the one containing `now`, as `YYYY-MM`
pub fn previous_month(now: DateTime<Utc>) -> String {
    let (year, month) = if now.month() == 1 {
        (now.year() - 1, 12)
    } else {
        (now.year(), now.month() - 1)
    };
    format!("{:04}-{:02}", year, month)
}

/// Check that `month` is a `YYYY-MM` string
pub fn parse_month(month: &str) -> StorageResult<()> {
    let valid = month.len() == 7
        && NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").is_ok();
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(format!(
            "month must be YYYY-MM, got '{}'",
            month
        )))
    }
}

/// Merge every object under `source_dir` whose name contains `month`.
///
/// A source object that is not valid JSON fails the whole run; nothing is
/// written in that case.
pub async fn consolidate_month(
    storage: &dyn StorageBackend,
    source_dir: &str,
    month: &str,
    target_dir: &str,
) -> StorageResult<ConsolidationReport> {
    parse_month(month)?;

    let keys: Vec<String> = storage
        .list_files(source_dir)
        .await?
        .into_iter()
        .filter(|key| {
            key.rsplit('/')
                .next()
                .is_some_and(|name| name.contains(month))
        })
        .collect();

    info!(month, source = source_dir, objects = keys.len(), "Consolidating month");

    if keys.is_empty() {
        warn!(month, source = source_dir, "No archived objects for month");
        return Ok(ConsolidationReport {
            month: month.to_string(),
            merged: 0,
            output_key: None,
        });
    }

    let mut data = Vec::with_capacity(keys.len());
    for key in &keys {
        let bytes = storage.read_file(key).await?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::SerializationError(format!("{}: {}", key, e)))?;
        data.push(value);
    }

    let output_key = format!("{}/{}-consolidated.json", target_dir.trim_matches('/'), month);
    let body = serde_json::to_vec(&json!({ "data": data }))
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    storage.write_file(&output_key, &body).await?;

    info!(month, key = %output_key, merged = keys.len(), "Consolidated file written");

    Ok(ConsolidationReport {
        month: month.to_string(),
        merged: keys.len(),
        output_key: Some(output_key),
    })
}
