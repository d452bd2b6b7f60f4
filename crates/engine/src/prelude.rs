//! Prelude module for common engine types
//!
//! ```
//! use torsion_engine::prelude::*;
//!
//! let mut unwrapper = AngleUnwrapper::new();
//! assert_eq!(unwrapper.unwrap(350.0), 350.0);
//! assert_eq!(unwrapper.unwrap(5.0), 365.0);
//! ```

pub use crate::machine::{MeasurementStateMachine, Reading};
pub use crate::runner::{MeasurementRunner, RunnerError, RunnerEvent};
pub use crate::sample::{RunHeader, RunParameters, Sample};
pub use crate::sampling::{SamplingLoop, TickOutcome};
pub use crate::sink::{DataSink, SinkFactory};
pub use crate::state::{MeasurementState, StopReason, StopReport};
pub use crate::unwrap::AngleUnwrapper;
