//! Top-level error type and classification shared by every bench crate.

use core::fmt;

use crate::{
    ActivationError, ActuatorCommandError, DurabilityError, InvalidTransitionError,
    SensorReadError, ValidationError,
};

/// Umbrella error for operations on the measurement state machine.
#[derive(Debug, thiserror::Error)]
pub enum MeasurementError {
    /// A sensor could not deliver a reading.
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorReadError),

    /// The motor rejected or failed a command.
    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorCommandError),

    /// The operation is not legal in the current state.
    #[error(transparent)]
    Transition(#[from] InvalidTransitionError),

    /// The data sink could not persist a sample.
    #[error("Durability error: {0}")]
    Durability(#[from] DurabilityError),

    /// One or more devices failed to connect.
    #[error(transparent)]
    Activation(#[from] ActivationError),

    /// Parameters or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The motor could not be stopped. The bench has been forced idle.
    #[error("HARD FAULT: {device} did not stop after {attempts} attempts: {source}")]
    HardFault {
        /// Name of the actuator that refused to stop
        device: String,
        /// Number of stop attempts made
        attempts: u32,
        /// Error returned by the last attempt
        #[source]
        source: ActuatorCommandError,
    },
}

impl MeasurementError {
    /// Get the error category for classification.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MeasurementError::Sensor(_) => ErrorCategory::Sensor,
            MeasurementError::Actuator(_) | MeasurementError::HardFault { .. } => {
                ErrorCategory::Actuator
            }
            MeasurementError::Transition(_) => ErrorCategory::Transition,
            MeasurementError::Durability(_) => ErrorCategory::Durability,
            MeasurementError::Activation(_) => ErrorCategory::Device,
            MeasurementError::Validation(_) => ErrorCategory::Validation,
        }
    }

    /// Get the error severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MeasurementError::Sensor(e) => e.severity(),
            MeasurementError::Actuator(e) => e.severity(),
            MeasurementError::Transition(_) => ErrorSeverity::Warning,
            MeasurementError::Durability(_) => ErrorSeverity::Error,
            MeasurementError::Activation(_) => ErrorSeverity::Error,
            MeasurementError::Validation(e) => e.severity(),
            MeasurementError::HardFault { .. } => ErrorSeverity::Critical,
        }
    }

    /// Check if the bench can keep operating after this error.
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }

    /// Check if this error is a hard fault.
    pub fn is_hard_fault(&self) -> bool {
        matches!(self, MeasurementError::HardFault { .. })
    }

    /// Create a hard fault error.
    pub fn hard_fault(
        device: impl Into<String>,
        attempts: u32,
        source: ActuatorCommandError,
    ) -> Self {
        MeasurementError::HardFault {
            device: device.into(),
            attempts,
            source,
        }
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Sensor read errors
    Sensor = 0,
    /// Motor command errors
    Actuator = 1,
    /// State machine usage errors
    Transition = 2,
    /// Data sink errors
    Durability = 3,
    /// Device connection errors
    Device = 4,
    /// Validation errors
    Validation = 5,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Sensor => write!(f, "Sensor"),
            ErrorCategory::Actuator => write!(f, "Actuator"),
            ErrorCategory::Transition => write!(f, "Transition"),
            ErrorCategory::Durability => write!(f, "Durability"),
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Validation => write!(f, "Validation"),
        }
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, no action required
    Info = 0,
    /// Warning, may require attention
    Warning = 1,
    /// Error, operation failed
    Error = 2,
    /// Critical, the bench may be in an unsafe state
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
