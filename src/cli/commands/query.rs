//! SQL query CLI command
//!
//! Runs an ad-hoc query against the configured record store.

use std::path::PathBuf;

use crate::cli::backends::{open_store, runtime};
use crate::cli::error::CliError;
use crate::config::IngestConfig;
use crate::database::{OutputFormat, format_query_result};

/// Query command arguments
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// SQL query to execute
    pub sql: String,
    /// Directory holding `.coin-ingest.toml`
    pub config_dir: PathBuf,
    /// Output format
    pub format: String,
}

/// Execute a SQL query against the configured store
pub fn handle_query(args: &QueryArgs) -> Result<(), CliError> {
    let config = IngestConfig::load(&args.config_dir)?;

    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    let rt = runtime()?;
    rt.block_on(async {
        let store = open_store(&config, &args.config_dir)?;
        let result = store.execute_query(&args.sql).await?;

        println!("{}", format_query_result(&result, output_format));

        if output_format == OutputFormat::Table {
            eprintln!("\nExecution time: {}ms", result.execution_time_ms);
        }
        Ok(())
    })
}
