//! Parse run files back into memory.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::format::{COLUMNS, SAMPLE_SEPARATOR, STARTED_FORMAT, STARTED_PREFIX, parse_elapsed};

/// Errors while reading a run file.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The file could not be read
    #[error("Failed to read run file: {0}")]
    Io(#[from] std::io::Error),

    /// A line does not follow the record layout
    #[error("Malformed run file at line {line}: {reason}")]
    Malformed {
        /// 1-based line number
        line: usize,
        /// What is wrong
        reason: String,
    },
}

impl RecordError {
    fn malformed(line: usize, reason: impl Into<String>) -> Self {
        RecordError::Malformed {
            line,
            reason: reason.into(),
        }
    }
}

/// Parameters from the second header line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordParameters {
    /// Angle limit, degrees
    pub max_angle: f64,
    /// Torque limit, Nm
    pub max_torque: f64,
    /// Velocity, deg/s
    pub velocity: f64,
    /// Torque conversion factor, Nm/V
    pub torque_scale: f64,
    /// Tick period, milliseconds
    pub interval_ms: u64,
}

/// One data row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordRow {
    /// Run time, truncated to tenths of a second
    pub elapsed: Duration,
    /// Torque channel voltage
    pub torque_voltage: f64,
    /// Angle channel voltage (or motor position)
    pub angle_voltage: f64,
    /// Torque, Nm
    pub torque: f64,
    /// Continuous angle, degrees
    pub angle: f64,
}

/// A parsed run file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// Wall-clock start from the header
    pub started_at: NaiveDateTime,
    /// Sample name as entered
    pub sample_name: String,
    /// Run parameters from the header
    pub parameters: RecordParameters,
    /// Data rows in file order
    pub rows: Vec<RecordRow>,
    /// The last row was cut off, e.g. by a crash while writing it
    pub truncated: bool,
}

impl RunRecord {
    /// Largest absolute torque, if any row exists.
    pub fn peak_torque(&self) -> Option<f64> {
        self.rows
            .iter()
            .map(|row| row.torque)
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
    }

    /// Angle of the last row.
    pub fn final_angle(&self) -> Option<f64> {
        self.rows.last().map(|row| row.angle)
    }

    /// Elapsed time of the last row.
    pub fn duration(&self) -> Duration {
        self.rows.last().map_or(Duration::ZERO, |row| row.elapsed)
    }
}

/// Read and parse a run file.
///
/// An unterminated last line that fails to parse is dropped and reported via
/// [`RunRecord::truncated`]; any other malformed line is an error.
///
/// # Errors
///
/// [`RecordError::Io`] if the file cannot be read, otherwise
/// [`RecordError::Malformed`] naming the first bad line.
pub fn read_run_file(path: impl AsRef<Path>) -> Result<RunRecord, RecordError> {
    let content = fs::read_to_string(path)?;
    parse_run_text(&content)
}

/// Parse the text of a run file. See [`read_run_file`].
///
/// # Errors
///
/// [`RecordError::Malformed`] naming the first bad line.
pub fn parse_run_text(content: &str) -> Result<RunRecord, RecordError> {
    let mut lines = content.lines().enumerate().map(|(i, l)| (i + 1, l));

    let (n, first) = lines
        .next()
        .ok_or_else(|| RecordError::malformed(1, "empty file"))?;
    let (started_at, sample_name) = parse_started(n, first)?;

    let (n, second) = lines
        .next()
        .ok_or_else(|| RecordError::malformed(2, "missing parameter line"))?;
    let parameters = parse_parameters(n, second)?;

    let (n, columns) = lines
        .next()
        .ok_or_else(|| RecordError::malformed(3, "missing column line"))?;
    if columns.split('\t').ne(COLUMNS) {
        return Err(RecordError::malformed(n, "unexpected column names"));
    }
    let _units = lines
        .next()
        .ok_or_else(|| RecordError::malformed(4, "missing unit line"))?;

    let unterminated = !content.is_empty() && !content.ends_with('\n');
    let mut rows = Vec::new();
    let mut truncated = false;
    let mut lines = lines.peekable();
    while let Some((n, line)) = lines.next() {
        if line.is_empty() {
            continue;
        }
        match parse_row(n, line) {
            Ok(row) => rows.push(row),
            Err(_) if unterminated && lines.peek().is_none() => truncated = true,
            Err(err) => return Err(err),
        }
    }

    Ok(RunRecord {
        started_at,
        sample_name,
        parameters,
        rows,
        truncated,
    })
}

fn parse_started(n: usize, line: &str) -> Result<(NaiveDateTime, String), RecordError> {
    let rest = line
        .strip_prefix(STARTED_PREFIX)
        .ok_or_else(|| RecordError::malformed(n, "missing start line"))?;
    let (stamp, name) = rest
        .split_once(SAMPLE_SEPARATOR)
        .ok_or_else(|| RecordError::malformed(n, "missing sample name"))?;
    let started_at = NaiveDateTime::parse_from_str(stamp, STARTED_FORMAT)
        .map_err(|e| RecordError::malformed(n, format!("bad start time {stamp:?}: {e}")))?;
    Ok((started_at, name.to_string()))
}

fn parse_parameters(n: usize, line: &str) -> Result<RecordParameters, RecordError> {
    let body = line
        .strip_prefix("# ")
        .ok_or_else(|| RecordError::malformed(n, "missing parameter line"))?;

    let mut max_angle = None;
    let mut max_torque = None;
    let mut velocity = None;
    let mut torque_scale = None;
    let mut interval_ms = None;
    for field in body.split(" | ") {
        let (key, value) = field
            .split_once(": ")
            .ok_or_else(|| RecordError::malformed(n, format!("bad field {field:?}")))?;
        let number = |text: &str| {
            text.parse::<f64>()
                .map_err(|e| RecordError::malformed(n, format!("{key}: {e}")))
        };
        match key {
            "Max Angle [deg]" => max_angle = Some(number(value)?),
            "Max Torque [Nm]" => max_torque = Some(number(value)?),
            "Velocity [deg/s]" => velocity = Some(number(value)?),
            "Torque Scale [Nm/V]" => torque_scale = Some(number(value)?),
            "Interval" => {
                let ms = value.strip_suffix("ms").unwrap_or(value);
                interval_ms = Some(
                    ms.parse::<u64>()
                        .map_err(|e| RecordError::malformed(n, format!("Interval: {e}")))?,
                );
            }
            _ => {}
        }
    }

    let missing = |name: &str| RecordError::malformed(n, format!("missing {name}"));
    Ok(RecordParameters {
        max_angle: max_angle.ok_or_else(|| missing("Max Angle"))?,
        max_torque: max_torque.ok_or_else(|| missing("Max Torque"))?,
        velocity: velocity.ok_or_else(|| missing("Velocity"))?,
        torque_scale: torque_scale.ok_or_else(|| missing("Torque Scale"))?,
        interval_ms: interval_ms.ok_or_else(|| missing("Interval"))?,
    })
}

fn parse_row(n: usize, line: &str) -> Result<RecordRow, RecordError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [time, torque_voltage, angle_voltage, torque, angle] = fields.as_slice() else {
        return Err(RecordError::malformed(
            n,
            format!("expected 5 fields, found {}", fields.len()),
        ));
    };
    let number = |name: &str, text: &str| {
        text.parse::<f64>()
            .map_err(|e| RecordError::malformed(n, format!("{name}: {e}")))
    };
    Ok(RecordRow {
        elapsed: parse_elapsed(time)
            .ok_or_else(|| RecordError::malformed(n, format!("bad time {time:?}")))?,
        torque_voltage: number("Voltage_Torque", torque_voltage)?,
        angle_voltage: number("Voltage_Angle", angle_voltage)?,
        torque: number("Torque", torque)?,
        angle: number("Angle", angle)?,
    })
}
