//! Summaries of recorded runs

use anyhow::{Result, anyhow};
use std::path::Path;
use tracing::warn;

use crate::error::CliError;
use crate::output;

/// Summarise the run file at `path`, or the data file inside a run folder.
pub fn execute(path: &Path, rows: bool, json: bool) -> Result<()> {
    let file = data_file(path)?;
    let record = torsion_recorder::read_run_file(&file).map_err(CliError::from)?;
    if record.truncated {
        warn!(path = %file.display(), "last row was cut off and has been ignored");
    }
    output::print_record(&file, &record, rows, json)
}

fn data_file(path: &Path) -> Result<std::path::PathBuf> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Run folder name is not valid UTF-8: {}", path.display()))?;
    Ok(path.join(format!("{name}{}", torsion_recorder::format::DATA_SUFFIX)))
}
