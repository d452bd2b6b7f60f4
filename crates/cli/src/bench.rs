//! Build a running bench from the configuration.

use anyhow::{Context, Result};
use std::path::Path;
use torsion_config::BenchConfig;
use torsion_engine::{MeasurementRunner, MeasurementStateMachine, SamplingLoop};
use torsion_hardware::simulated::RigProbe;
use torsion_hardware::{SimulatedBench, SystemClock};
use torsion_recorder::RunFileFactory;
use tracing::info;

use crate::error::CliError;

/// Control thread plus what the commands need to report on it.
pub struct Bench {
    pub runner: MeasurementRunner,
    pub files: RunFileFactory,
    pub probe: RigProbe,
}

/// Load and validate the configuration at `path`.
///
/// A missing file is written with the defaults first.
pub fn load_config(path: &Path) -> Result<BenchConfig> {
    BenchConfig::load_from_path(path)
        .with_context(|| format!("Failed to load bench configuration from {}", path.display()))
}

/// Spawn the control thread over the configured hardware and connect it.
pub fn open(config: &BenchConfig) -> Result<Bench> {
    if !config.demo_mode {
        return Err(CliError::HardwareUnavailable(
            "no drive or DAQ transport is built into torsionctl; set demo_mode to true".to_string(),
        )
        .into());
    }

    let clock = SystemClock::shared();
    let simulated = SimulatedBench::new(config, clock.clone());
    let probe = simulated.probe();
    let machine = MeasurementStateMachine::new(simulated.into_hardware(), config);

    let files = RunFileFactory::new(&config.recorder.output_dir);
    let sampling = SamplingLoop::new(
        machine,
        Box::new(files.clone()),
        clock,
        &config.sampling,
    );
    let runner = MeasurementRunner::spawn(sampling, config.sampling.period())
        .map_err(CliError::from)?;

    runner.activate().map_err(CliError::from)?;
    info!(output_dir = %files.root().display(), "simulated bench active");
    Ok(Bench {
        runner,
        files,
        probe,
    })
}
