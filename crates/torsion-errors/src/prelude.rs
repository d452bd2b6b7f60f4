//! Prelude module for convenient error handling imports.
//!
//! ```
//! use torsion_errors::prelude::*;
//!
//! fn run_guard(running: bool) -> Result<()> {
//!     if running {
//!         return Err(InvalidTransitionError::new("Running", "set_parameters").into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(run_guard(true).is_err());
//! ```

pub use crate::{
    Result,
    common::{ErrorCategory, ErrorSeverity, MeasurementError},
    device::{ActivationError, ActuatorCommandError, DeviceError, DeviceFailure, SensorReadError},
    sink::DurabilityError,
    transition::InvalidTransitionError,
    validation::ValidationError,
};
