//! Recorded measurement runs

use anyhow::Result;
use crossbeam::channel::RecvTimeoutError;
use std::path::Path;
use std::time::{Duration, Instant};
use torsion_engine::{RunParameters, RunnerEvent, StopReport, TickOutcome};
use tracing::{debug, info, warn};

use crate::bench::{self, Bench};
use crate::commands::RunArgs;
use crate::error::CliError;
use crate::output::{self, RunSummary};

/// How long to wait for an event before re-checking the timeout.
const EVENT_POLL: Duration = Duration::from_millis(250);

/// Execute one run from activation to stop.
pub fn execute(args: &RunArgs, config_path: &Path, json: bool) -> Result<()> {
    let mut config = bench::load_config(config_path)?;
    if let Some(dir) = &args.output_dir {
        config.recorder.output_dir = dir.clone();
    }

    let defaults = RunParameters::from_defaults(&config.run);
    let params = RunParameters::new(
        args.max_angle.unwrap_or(defaults.max_angle),
        args.max_torque.unwrap_or(defaults.max_torque),
        args.velocity.unwrap_or(defaults.velocity),
    );
    let sample_name = args
        .sample
        .clone()
        .unwrap_or_else(|| config.run.sample_name.clone());

    let bench = bench::open(&config)?;
    let result = record(&bench, args, params, &sample_name, json);
    let Bench {
        runner,
        files,
        probe,
    } = bench;
    runner.shutdown();

    let (header, report, samples) = result?;
    let summary = RunSummary {
        sample_name,
        parameters: params,
        samples,
        stop: report,
        final_position: probe.position(),
        record: files.latest_file_for(&header),
    };
    output::print_run_summary(&summary, json);
    Ok(())
}

fn record(
    bench: &Bench,
    args: &RunArgs,
    params: RunParameters,
    sample_name: &str,
    json: bool,
) -> Result<(torsion_engine::RunHeader, StopReport, u64)> {
    let runner = &bench.runner;
    if args.zero {
        runner.calibrate_zero().map_err(CliError::from)?;
        info!("torque channel zeroed");
    }

    let header = runner.start(params, sample_name).map_err(CliError::from)?;
    info!(
        sample = sample_name,
        max_angle = params.max_angle,
        max_torque = params.max_torque,
        velocity = params.velocity,
        "run started"
    );

    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    let mut samples: u64 = 0;
    loop {
        if Instant::now() >= deadline {
            warn!(timeout_s = args.timeout, "run timed out, stopping");
            let report = runner.stop().map_err(CliError::from)?;
            debug!(%report, "run stopped after timeout");
            return Err(CliError::RunTimedOut(args.timeout).into());
        }

        let event = match runner.events().recv_timeout(EVENT_POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::Runner(torsion_engine::RunnerError::Disconnected).into());
            }
        };

        match event {
            RunnerEvent::Tick(outcome) => {
                if let Some(sample) = outcome.sample() {
                    samples = samples.saturating_add(1);
                    if args.follow && !json {
                        output::print_sample(sample);
                    }
                }
                match outcome {
                    TickOutcome::Stopped { report, .. } => return Ok((header, report, samples)),
                    TickOutcome::Faulted { error } => return Err(CliError::from(error).into()),
                    TickOutcome::Idle | TickOutcome::Sampled { .. } => {}
                }
            }
            RunnerEvent::DeadlineMissed { tick, lateness } => {
                warn!(tick, lateness_ms = lateness.as_millis(), "sampling deadline missed");
            }
            RunnerEvent::StateChanged { from, to } => {
                debug!(%from, %to, "bench state changed");
            }
        }
    }
}
