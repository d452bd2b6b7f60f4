//! Error types for torsionctl

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Config file already exists: {} (use --force to overwrite)", .0.display())]
    ConfigExists(PathBuf),

    #[error("Validation error: {0}")]
    ValidationError(#[from] torsion_errors::ValidationError),

    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("Measurement error: {0}")]
    Measurement(#[from] torsion_errors::MeasurementError),

    #[error("Control thread error: {0}")]
    Runner(#[from] torsion_engine::RunnerError),

    #[error("Run did not finish within {0} s and was stopped")]
    RunTimedOut(u64),

    #[error("Run record error: {0}")]
    Record(#[from] torsion_recorder::RecordError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigNotFound(_) | CliError::Record(_) => 3,
            CliError::ConfigExists(_)
            | CliError::ValidationError(_)
            | CliError::JsonError(_) => 4,
            CliError::HardwareUnavailable(_) => 5,
            CliError::Measurement(err) if err.is_hard_fault() => 6,
            CliError::Runner(torsion_engine::RunnerError::Measurement(err))
                if err.is_hard_fault() =>
            {
                6
            }
            CliError::RunTimedOut(_) => 7,
            _ => 1,
        }
    }
}
