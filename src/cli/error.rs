//! CLI-specific error types

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::database::StoreError;
use crate::pipeline::PipelineError;
use crate::schema::SchemaError;
use crate::storage::StorageError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read file {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Message rejected: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] StoreError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// The selected backend was compiled out
    #[error("{0} support not enabled. Build with --features {1}")]
    FeatureDisabled(&'static str, &'static str),
}
