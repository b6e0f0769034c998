//! Consolidate command
//!
//! Merges one month of archived payloads into a single object.

use std::path::PathBuf;

use chrono::Utc;

use crate::cli::backends::{open_storage, runtime};
use crate::cli::error::CliError;
use crate::config::IngestConfig;
use crate::storage::{ConsolidationReport, consolidate_month, previous_month};

/// Consolidate command arguments
#[derive(Debug, Clone)]
pub struct ConsolidateArgs {
    /// Month as `YYYY-MM`; the previous month when absent
    pub month: Option<String>,
    /// Directory holding `.coin-ingest.toml`
    pub config_dir: PathBuf,
}

pub fn handle_consolidate(args: &ConsolidateArgs) -> Result<ConsolidationReport, CliError> {
    let config = IngestConfig::load(&args.config_dir)?;
    let month = args
        .month
        .clone()
        .unwrap_or_else(|| previous_month(Utc::now()));

    let rt = runtime()?;
    let report = rt.block_on(async {
        let storage = open_storage(&config, &args.config_dir).await?;
        let report = consolidate_month(
            storage.as_ref(),
            &config.archive.category,
            &month,
            &config.archive.consolidated_category,
        )
        .await?;
        Ok::<_, CliError>(report)
    })?;

    match &report.output_key {
        Some(key) => println!("Merged {} objects for {} into {}", report.merged, report.month, key),
        None => println!("No archived objects for {}", report.month),
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILENAME;
    use tempfile::tempdir;

    #[test]
    fn test_consolidates_filesystem_archive() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "[archive]\nroot = \"store\"\n").unwrap();
        let minute = dir.path().join("store/Minute");
        std::fs::create_dir_all(&minute).unwrap();
        std::fs::write(minute.join("2024-09-01T00-00-00.json"), r#"{"n":1}"#).unwrap();
        std::fs::write(minute.join("2024-09-02T00-00-00.json"), r#"{"n":2}"#).unwrap();

        let report = handle_consolidate(&ConsolidateArgs {
            month: Some("2024-09".to_string()),
            config_dir: dir.path().to_path_buf(),
        })
        .unwrap();

        assert_eq!(report.merged, 2);
        let merged = std::fs::read_to_string(dir.path().join("store/Month/2024-09-consolidated.json")).unwrap();
        assert_eq!(merged, r#"{"data":[{"n":1},{"n":2}]}"#);
    }

    #[test]
    fn test_rejects_malformed_month() {
        let dir = tempdir().unwrap();
        let err = handle_consolidate(&ConsolidateArgs {
            month: Some("September".to_string()),
            config_dir: dir.path().to_path_buf(),
        })
        .unwrap_err();
        assert!(matches!(err, CliError::StorageError(_)));
    }
}
