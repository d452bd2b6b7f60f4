//! Configuration file commands

use anyhow::{Context, Result};
use std::path::Path;
use torsion_config::BenchConfig;
use tracing::info;

use crate::commands::ConfigCommands;
use crate::error::CliError;
use crate::output;

/// Execute a config subcommand against the file at `path`.
pub fn execute(cmd: &ConfigCommands, path: &Path, json: bool) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(path, json),
        ConfigCommands::Init { force } => init(path, *force, json),
        ConfigCommands::Validate => validate(path, json),
    }
}

/// Print the file's configuration, or the defaults when there is no file.
/// Never writes.
fn show(path: &Path, json: bool) -> Result<()> {
    let config = if path.exists() {
        read(path)?
    } else {
        info!(path = %path.display(), "no config file, showing defaults");
        BenchConfig::default()
    };
    output::print_config(&config, json)
}

fn init(path: &Path, force: bool, json: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::ConfigExists(path.to_path_buf()).into());
    }
    BenchConfig::default().save_to_path(path)?;
    output::print_success(&format!("Wrote default configuration to {}", path.display()), json);
    Ok(())
}

fn validate(path: &Path, json: bool) -> Result<()> {
    if !path.exists() {
        return Err(CliError::ConfigNotFound(path.to_path_buf()).into());
    }
    let config = read(path)?;
    config.validate().map_err(CliError::from)?;
    output::print_success(&format!("{} is valid", path.display()), json);
    Ok(())
}

/// Parse without validating, so `validate` can report the exact problem.
fn read(path: &Path) -> Result<BenchConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = serde_json::from_str(&content).map_err(CliError::from)?;
    Ok(config)
}
