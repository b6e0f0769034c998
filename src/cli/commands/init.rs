//! Init command
//!
//! Writes a sample `.coin-ingest.toml`.

use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::config::{CONFIG_FILENAME, IngestConfig, sample_config};

/// Init command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    /// Directory to write the configuration into
    pub dir: PathBuf,
    /// Overwrite an existing configuration
    pub force: bool,
}

pub fn handle_init(args: &InitArgs) -> Result<PathBuf, CliError> {
    let config_path = args.dir.join(CONFIG_FILENAME);

    if IngestConfig::exists(&args.dir) && !args.force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        )));
    }

    write_sample(&args.dir, &config_path)?;
    println!("Wrote {}", config_path.display());
    Ok(config_path)
}

fn write_sample(dir: &Path, config_path: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| CliError::FileWriteError(dir.to_path_buf(), e.to_string()))?;
    std::fs::write(config_path, sample_config())
        .map_err(|e| CliError::FileWriteError(config_path.to_path_buf(), e.to_string()))
}
