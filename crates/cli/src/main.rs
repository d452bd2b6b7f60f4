//! torsionctl - Torsion bench operator CLI
//!
//! Runs recorded measurements, manual readouts and homing on the bench
//! described by the configuration file, and summarises recorded runs.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod bench;
mod commands;
mod completion;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{ConfigCommands, RunArgs};
use crate::error::CliError;

/// Crates whose logs `-v` turns up.
const LOG_TARGETS: [&str; 4] = [
    "torsionctl",
    "torsion_engine",
    "torsion_recorder",
    "torsion_hardware",
];

#[derive(Parser, Debug)]
#[command(name = "torsionctl")]
#[command(about = "Torsion bench control - run, record and inspect torsion measurements")]
#[command(version)]
#[command(long_about = "
torsionctl drives the torsion test bench: it turns the specimen at a fixed
speed, samples torque and angle every tick, stops the motor before the angle
or torque limit is exceeded, and writes every sample to a run record.

With demo_mode enabled in the configuration the simulated bench is used.
Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Bench configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "TORSIONCTL_CONFIG",
        default_value = "torsion.json"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run and record one measurement until a limit or the timeout stops it
    Run(RunArgs),

    /// Read torque and angle without starting a run
    Read {
        /// Number of readings
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
        /// Pause between readings in milliseconds
        #[arg(short, long, default_value_t = 500)]
        interval_ms: u64,
        /// Zero the torque channel first
        #[arg(long)]
        zero: bool,
    },

    /// Move the motor to its home position
    Home,

    /// Configuration file commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Summarise a recorded run file or run folder
    Inspect {
        /// Data file or run folder
        path: PathBuf,
        /// Also print every row
        #[arg(long)]
        rows: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let default_filter = LOG_TARGETS
        .map(|target| format!("{target}={log_level}"))
        .join(",");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            std::process::exit(exit_code);
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.config, cli.json),
        Commands::Read {
            count,
            interval_ms,
            zero,
        } => commands::manual::read(&cli.config, *count, *interval_ms, *zero, cli.json),
        Commands::Home => commands::manual::home(&cli.config, cli.json),
        Commands::Config(cmd) => commands::config::execute(cmd, &cli.config, cli.json),
        Commands::Inspect { path, rows } => commands::inspect::execute(path, *rows, cli.json),
        Commands::Completion { shell } => {
            completion::generate_completion(*shell);
            Ok(())
        }
    }
}
