//! Error taxonomy for the torsion bench measurement core.
//!
//! Every failure the control core can observe falls into one of a small
//! number of families, and each family has a fixed propagation policy:
//!
//! - [`SensorReadError`]: absorbed inside a tick, a substitute value is used
//! - [`ActuatorCommandError`]: propagated to the state machine; a failed
//!   stop is retried and then escalated to a hard fault
//! - [`InvalidTransitionError`]: rejected at the call site with no side effects
//! - [`DurabilityError`]: forces the running measurement to stop
//!
//! [`MeasurementError`] wraps all of them for callers that drive the state
//! machine as a whole.
//!
//! # Example
//!
//! ```
//! use torsion_errors::prelude::*;
//!
//! fn check_limit(value: f64) -> Result<f64> {
//!     if !value.is_finite() || value < 0.0 {
//!         return Err(ValidationError::out_of_range("max_torque", value, 0.0, f64::MAX).into());
//!     }
//!     Ok(value)
//! }
//!
//! assert!(check_limit(-1.0).is_err());
//! ```

#![deny(clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod common;
pub mod device;
pub mod prelude;
pub mod sink;
pub mod transition;
pub mod validation;

pub use common::{ErrorCategory, ErrorSeverity, MeasurementError};
pub use device::{ActivationError, ActuatorCommandError, DeviceError, DeviceFailure, SensorReadError};
pub use sink::DurabilityError;
pub use transition::InvalidTransitionError;
pub use validation::ValidationError;

/// A specialized `Result` type for measurement operations.
pub type Result<T> = std::result::Result<T, MeasurementError>;
