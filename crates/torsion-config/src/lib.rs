//! Bench configuration.
//!
//! All tunables of the measurement core live in one [`BenchConfig`] value
//! that is passed to the state machine and the hardware adapters when they
//! are built. Nothing reads configuration from process-wide state.
//!
//! The JSON produced by [`BenchConfig::save_to_path`] mirrors the struct
//! layout. It is a convenience for operators, not a versioned interchange
//! format.

#![deny(clippy::unwrap_used)]

pub mod bench;
pub mod sections;

pub use bench::{BenchConfig, SCHEMA_VERSION};
pub use sections::{
    AngleChannelConfig, AngleSource, MotorBackend, MotorConfig, RecorderConfig, RunDefaults,
    SafetyConfig, SamplingConfig, SimulationConfig, TorqueChannelConfig,
};
