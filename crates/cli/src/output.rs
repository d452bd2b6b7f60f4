//! Output formatting for CLI responses

use anyhow::{Error, Result};
use colored::*;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use torsion_config::BenchConfig;
use torsion_engine::{Reading, RunParameters, Sample, StopReport};
use torsion_recorder::{RunRecord, format_elapsed};

use crate::error::CliError;

/// Result of `torsionctl run`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub sample_name: String,
    pub parameters: RunParameters,
    pub samples: u64,
    pub stop: StopReport,
    /// Simulated shaft position after the stop, degrees
    pub final_position: f64,
    pub record: Option<PathBuf>,
}

fn print_json(value: &serde_json::Value, what: &str) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to format {} as JSON: {}", what, e),
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": error_type_name(error)
        }
    });
    print_json(&error_json, "error");
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

fn error_type_name(error: &Error) -> String {
    match error.downcast_ref::<CliError>() {
        Some(cli) => format!("{:?}", cli)
            .split(['(', ' ', '{'])
            .next()
            .unwrap_or("Unknown")
            .to_string(),
        None => "Error".to_string(),
    }
}

/// Print success message
pub fn print_success(message: &str, json: bool) {
    if json {
        print_json(
            &json!({
                "success": true,
                "message": message
            }),
            "success message",
        );
    } else {
        println!("{} {}", "✓".green(), message);
    }
}

/// Print the configuration as JSON; human output is the same document.
pub fn print_config(config: &BenchConfig, json: bool) -> Result<()> {
    if json {
        print_json(
            &json!({
                "success": true,
                "config": serde_json::to_value(config)?
            }),
            "configuration",
        );
    } else {
        println!("{}", serde_json::to_string_pretty(config)?);
    }
    Ok(())
}

/// One line per sample while following a run.
pub fn print_sample(sample: &Sample) {
    println!(
        "  {} {:>5}  {:>9.3} Nm  {:>10.2} deg",
        format_elapsed(sample.elapsed).dimmed(),
        sample.index,
        sample.torque,
        sample.angle
    );
}

/// Print the result of a run
pub fn print_run_summary(summary: &RunSummary, json: bool) {
    if json {
        let output = json!({
            "success": true,
            "run": summary
        });
        print_json(&output, "run summary");
        return;
    }

    let reason = summary.stop.reason.to_string();
    let reason = if summary.stop.reason.is_forced() {
        reason.yellow()
    } else {
        reason.green()
    };
    println!("{} {}", "Run finished:".bold(), summary.sample_name);
    println!("  Stop: {}", reason);
    println!("  Samples: {}", summary.samples);
    println!(
        "  Limits: {} deg, {} Nm at {} deg/s",
        summary.parameters.max_angle, summary.parameters.max_torque, summary.parameters.velocity
    );
    println!("  Final position: {:.2} deg", summary.final_position);
    match &summary.record {
        Some(path) => println!("  Record: {}", path.display()),
        None => println!("  Record: {}", "not found".red()),
    }
}

/// Print one manual reading
pub fn print_reading(reading: &Reading) {
    println!(
        "{} {:>8.4} V  {:>9.3} Nm   {} {:>8.4} V  {:>7.2} deg",
        "Torque:".bold(),
        reading.torque_voltage,
        reading.torque,
        "Angle:".bold(),
        reading.angle_voltage,
        reading.raw_angle
    );
}

/// Print all manual readings as one JSON document
pub fn print_readings_json(readings: &[Reading]) {
    let readings: Vec<_> = readings
        .iter()
        .map(|r| {
            json!({
                "torque_voltage": r.torque_voltage,
                "torque": r.torque,
                "angle_voltage": r.angle_voltage,
                "raw_angle": r.raw_angle
            })
        })
        .collect();
    print_json(
        &json!({
            "success": true,
            "readings": readings
        }),
        "readings",
    );
}

/// Print the position after homing
pub fn print_homed(position: f64, json: bool) {
    if json {
        print_json(
            &json!({
                "success": true,
                "position": position
            }),
            "homing result",
        );
    } else {
        println!("{} position {:.2} deg", "✓ Homed,".green(), position);
    }
}

/// Print a recorded run, optionally with every row
pub fn print_record(path: &Path, record: &RunRecord, rows: bool, json: bool) -> Result<()> {
    if json {
        let mut run = serde_json::to_value(record)?;
        if !rows && let Some(obj) = run.as_object_mut() {
            obj.remove("rows");
        }
        print_json(
            &json!({
                "success": true,
                "path": path,
                "row_count": record.rows.len(),
                "peak_torque": record.peak_torque(),
                "final_angle": record.final_angle(),
                "run": run
            }),
            "run record",
        );
        return Ok(());
    }

    let params = &record.parameters;
    println!("{} {}", "Run:".bold(), path.display());
    println!("  Sample: {}", record.sample_name);
    println!("  Started: {}", record.started_at.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "  Limits: {} deg, {} Nm at {} deg/s ({} Nm/V, {} ms)",
        params.max_angle, params.max_torque, params.velocity, params.torque_scale, params.interval_ms
    );
    println!("  Rows: {}", record.rows.len());
    println!("  Duration: {}", format_elapsed(record.duration()));
    if let Some(peak) = record.peak_torque() {
        println!("  Peak torque: {:.3} Nm", peak);
    }
    if let Some(angle) = record.final_angle() {
        println!("  Final angle: {:.2} deg", angle);
    }
    if record.truncated {
        println!("  {}", "Last row was cut off".yellow());
    }

    if rows {
        for row in &record.rows {
            println!(
                "  {}  {:>9.3} Nm  {:>10.2} deg",
                format_elapsed(row.elapsed).dimmed(),
                row.torque,
                row.angle
            );
        }
    }
    Ok(())
}
