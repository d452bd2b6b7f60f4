//! Torsion Bench Engine - measurement control core
//!
//! This crate turns raw bench readings into a recorded torsion run and
//! guarantees the motor is stopped before a limit is overrun:
//!
//! - [`AngleUnwrapper`] turns the single-turn angle signal into a
//!   continuous multi-turn angle
//! - [`MeasurementStateMachine`] gates every hardware action by state
//! - [`SamplingLoop`] performs one acquisition and limit check per tick
//! - [`MeasurementRunner`] runs the sampling loop on its own control thread
//!   at a fixed period and accepts operator commands between ticks
//!
//! Samples go to a [`DataSink`] opened per run by a [`SinkFactory`].

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

pub mod machine;
pub mod prelude;
pub mod runner;
pub mod sample;
pub mod sampling;
pub mod sink;
pub mod state;
pub mod unwrap;

pub use machine::{MeasurementStateMachine, Reading};
pub use runner::{MeasurementRunner, RunnerCommand, RunnerError, RunnerEvent};
pub use sample::{RunHeader, RunParameters, Sample};
pub use sampling::{SamplingLoop, TickOutcome};
pub use sink::{DataSink, SinkFactory};
pub use state::{Alert, MeasurementState, StopReason, StopReport};
pub use unwrap::{AngleUnwrapper, DEFAULT_WRAP_THRESHOLD, FULL_TURN};
