//! Ingest command
//!
//! Processes one message from a file or stdin: the payload is mapped and
//! written to the configured store and archived to the configured blob
//! store.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::cli::backends::{open_storage, open_store, runtime};
use crate::cli::error::CliError;
use crate::config::IngestConfig;
use crate::database::PersistenceWriter;
use crate::pipeline::{Disposition, MessageOutcome, PersistError, Pipeline};
use crate::schema::SchemaRegistry;
use crate::storage::{ArchiveWriter, NamePolicy};

/// Ingest command arguments
#[derive(Debug, Clone)]
pub struct IngestArgs {
    /// File path, or `-` for stdin
    pub input: String,
    /// Schema id; the configured default when absent
    pub schema: Option<String>,
    /// Input is a push-subscription body rather than bare payload JSON
    pub push_envelope: bool,
    /// Directory holding `.coin-ingest.toml`
    pub config_dir: PathBuf,
}

/// Read the message text from a file or stdin
pub fn read_input(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| CliError::IoError(format!("Failed to read stdin: {}", e)))?;
        return Ok(buffer);
    }

    let path = PathBuf::from(input);
    if !path.exists() {
        return Err(CliError::FileNotFound(path));
    }
    std::fs::read_to_string(&path).map_err(|e| CliError::FileReadError(path, e.to_string()))
}

/// Process one message and report what happened to it
pub fn handle_ingest(args: &IngestArgs) -> Result<Disposition, CliError> {
    let config = IngestConfig::load(&args.config_dir)?;
    let schema_id = args
        .schema
        .clone()
        .unwrap_or_else(|| config.pipeline.schema.clone());
    let text = read_input(&args.input)?;

    let registry = Arc::new(SchemaRegistry::builtin()?);
    let pipeline = Pipeline::new(
        registry,
        PersistenceWriter::new(config.timeout()),
        ArchiveWriter::new(
            NamePolicy::with_category(config.archive.category.clone()),
            config.timeout(),
        ),
    );

    let rt = runtime()?;
    let outcome = rt.block_on(async {
        let store = open_store(&config, &args.config_dir)?;
        let storage = open_storage(&config, &args.config_dir).await?;

        let outcome = if args.push_envelope {
            pipeline
                .process_push(&text, &schema_id, store.as_ref(), storage.as_ref())
                .await?
        } else {
            pipeline
                .process(&text, &schema_id, store.as_ref(), storage.as_ref())
                .await?
        };
        Ok::<_, CliError>(outcome)
    })?;

    println!("{}", outcome_summary(&outcome));
    Ok(outcome.disposition())
}

/// One-line JSON summary of a processed message
pub fn outcome_summary(outcome: &MessageOutcome) -> String {
    let records = match &outcome.records {
        Ok(results) => json!({
            "total": results.len(),
            "written": outcome.written(),
            "rejected": outcome.rejected(),
            "failed": results
                .iter()
                .filter(|r| !r.is_written() && !r.is_rejected())
                .map(|r| r.to_string())
                .collect::<Vec<_>>(),
        }),
        Err(PersistError::Schema(e)) => json!({ "schema_error": e.to_string() }),
        Err(PersistError::Mapping(e)) => json!({ "mapping_error": e.to_string() }),
    };

    json!({
        "schema": outcome.schema_id,
        "archive": outcome.archive.to_string(),
        "records": records,
        "disposition": match outcome.disposition() {
            Disposition::Ack => "ack",
            Disposition::Retry => "retry",
        },
    })
    .to_string()
}
