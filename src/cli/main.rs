//! CLI binary entry point for coin-ingest

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use coin_ingest::cli::commands::consolidate::{ConsolidateArgs, handle_consolidate};
use coin_ingest::cli::commands::ingest::{IngestArgs, handle_ingest};
use coin_ingest::cli::commands::init::{InitArgs, handle_init};
use coin_ingest::cli::commands::query::{QueryArgs, handle_query};
use coin_ingest::cli::commands::schemas::{SchemasArgs, handle_schemas};
use coin_ingest::pipeline::Disposition;
use tracing_subscriber::EnvFilter;

/// Exit status asking the caller to redeliver the message later
const EXIT_RETRY: u8 = 75;

#[derive(Parser)]
#[command(name = "coin-ingest")]
#[command(about = "Schema-driven ingestion of crypto market payloads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map, persist and archive one message
    ///
    /// Exits with status 75 when a store was unavailable and the message
    /// should be redelivered.
    Ingest {
        /// Input file path or '-' for stdin
        #[arg(default_value = "-")]
        input: String,
        /// Schema id (default: [pipeline].schema from the configuration)
        #[arg(short, long)]
        schema: Option<String>,
        /// Input is a push-subscription body with base64 data
        #[arg(long)]
        push_envelope: bool,
        /// Directory holding .coin-ingest.toml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,
    },

    /// List registered schemas, or describe one
    Schemas {
        /// Schema id to describe
        #[arg(short, long)]
        schema: Option<String>,
        /// Dialect for the printed DDL (duckdb, postgres)
        #[arg(short, long, default_value = "duckdb")]
        dialect: String,
    },

    /// Merge one month of archived payloads into a single object
    Consolidate {
        /// Month as YYYY-MM (default: previous month)
        #[arg(short, long)]
        month: Option<String>,
        /// Directory holding .coin-ingest.toml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,
    },

    /// Write a sample .coin-ingest.toml
    Init {
        /// Target directory
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Execute SQL queries against the configured store
    Query {
        /// SQL query to execute
        sql: String,
        /// Directory holding .coin-ingest.toml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Ingest {
            input,
            schema,
            push_envelope,
            config,
        } => {
            let args = IngestArgs {
                input,
                schema,
                push_envelope,
                config_dir: config,
            };
            let disposition = handle_ingest(&args)
                .with_context(|| format!("Failed to ingest {}", args.input))?;
            Ok(match disposition {
                Disposition::Ack => ExitCode::SUCCESS,
                Disposition::Retry => ExitCode::from(EXIT_RETRY),
            })
        }
        Commands::Schemas { schema, dialect } => {
            handle_schemas(&SchemasArgs { schema, dialect })?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Consolidate { month, config } => {
            handle_consolidate(&ConsolidateArgs {
                month,
                config_dir: config,
            })
            .context("Consolidation failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { dir, force } => {
            handle_init(&InitArgs { dir, force })?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Query {
            sql,
            config,
            format,
        } => {
            handle_query(&QueryArgs {
                sql,
                config_dir: config,
                format,
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
