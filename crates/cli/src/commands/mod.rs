//! Command implementations for torsionctl

pub mod config;
pub mod inspect;
pub mod manual;
pub mod run;

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Sample (specimen) name; defaults to the configured one
    #[arg(short, long)]
    pub sample: Option<String>,

    /// Angle limit in degrees
    #[arg(long)]
    pub max_angle: Option<f64>,

    /// Torque limit in Nm
    #[arg(long)]
    pub max_torque: Option<f64>,

    /// Rotation speed in deg/s; negative turns the other way
    #[arg(long, allow_hyphen_values = true)]
    pub velocity: Option<f64>,

    /// Zero the torque channel before starting
    #[arg(long)]
    pub zero: bool,

    /// Stop the run after this many seconds if no limit ends it first
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,

    /// Root directory for run records, overriding the configuration
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Print every sample as it is taken
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Check the configuration file without touching hardware
    Validate,
}
