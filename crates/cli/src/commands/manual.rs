//! Manual readout and homing outside a run

use anyhow::Result;
use std::path::Path;
use std::thread;
use std::time::Duration;
use torsion_engine::Reading;
use tracing::info;

use crate::bench::{self, Bench};
use crate::error::CliError;
use crate::output;

/// Read both channels `count` times, `interval_ms` apart.
pub fn read(
    config_path: &Path,
    count: u32,
    interval_ms: u64,
    zero: bool,
    json: bool,
) -> Result<()> {
    let config = bench::load_config(config_path)?;
    let bench = bench::open(&config)?;

    let result = take_readings(&bench, count, interval_ms, zero, json);
    bench.runner.shutdown();

    let readings = result?;
    if json {
        output::print_readings_json(&readings);
    }
    Ok(())
}

fn take_readings(
    bench: &Bench,
    count: u32,
    interval_ms: u64,
    zero: bool,
    json: bool,
) -> Result<Vec<Reading>> {
    if zero {
        bench.runner.calibrate_zero().map_err(CliError::from)?;
        info!("torque channel zeroed");
    }
    let mut readings = Vec::new();
    for i in 0..count.max(1) {
        if i > 0 {
            thread::sleep(Duration::from_millis(interval_ms));
        }
        let reading = bench.runner.read_once().map_err(CliError::from)?;
        if !json {
            output::print_reading(&reading);
        }
        readings.push(reading);
    }
    Ok(readings)
}

/// Home the motor and report where it ended up.
pub fn home(config_path: &Path, json: bool) -> Result<()> {
    let config = bench::load_config(config_path)?;
    let bench = bench::open(&config)?;

    let result = bench.runner.home().map_err(CliError::from);
    let position = bench.probe.position();
    bench.runner.shutdown();

    result?;
    info!(position, "motor homed");
    output::print_homed(position, json);
    Ok(())
}
