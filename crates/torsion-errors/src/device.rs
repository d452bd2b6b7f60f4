//! Device, sensor and actuator error types.

use core::fmt;

use crate::common::ErrorSeverity;

/// Errors raised while opening or closing a bench device.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    /// Device not found
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Connection failed
    #[error("Failed to connect to {device}: {reason}")]
    ConnectionFailed {
        /// Device identifier
        device: String,
        /// Failure reason
        reason: String,
    },

    /// Device timeout
    #[error("Device {device} timeout after {timeout_ms}ms")]
    Timeout {
        /// Device identifier
        device: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Device busy
    #[error("Device {0} is busy")]
    Busy(String),

    /// Device initialization failed
    #[error("Failed to initialize device {device}: {reason}")]
    InitializationFailed {
        /// Device identifier
        device: String,
        /// Failure reason
        reason: String,
    },
}

impl DeviceError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeviceError::NotFound(_) => ErrorSeverity::Error,
            DeviceError::ConnectionFailed { .. } => ErrorSeverity::Error,
            DeviceError::Timeout { .. } => ErrorSeverity::Warning,
            DeviceError::Busy(_) => ErrorSeverity::Warning,
            DeviceError::InitializationFailed { .. } => ErrorSeverity::Error,
        }
    }

    /// Check if retrying the connection might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeviceError::Timeout { .. } | DeviceError::Busy(_))
    }

    /// Create a not found error.
    pub fn not_found(device: impl Into<String>) -> Self {
        DeviceError::NotFound(device.into())
    }

    /// Create a connection failed error.
    pub fn connection_failed(device: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::ConnectionFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(device: impl Into<String>, timeout_ms: u64) -> Self {
        DeviceError::Timeout {
            device: device.into(),
            timeout_ms,
        }
    }

    /// Create an initialization failed error.
    pub fn initialization_failed(device: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::InitializationFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }
}

/// A sensor could not deliver a voltage.
///
/// Sensor faults never abort a run. The sampling loop substitutes a safe
/// value for the tick and records a warning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorReadError {
    /// The read did not complete in time
    #[error("Sensor {device} read timed out after {timeout_ms}ms")]
    Timeout {
        /// Sensor identifier
        device: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// The sensor is not connected
    #[error("Sensor {0} is disconnected")]
    Disconnected(String),

    /// The sensor returned a value that cannot be used
    #[error("Sensor {device} returned an invalid reading: {reason}")]
    InvalidReading {
        /// Sensor identifier
        device: String,
        /// Why the reading was rejected
        reason: String,
    },

    /// Lower-level acquisition failure
    #[error("Acquisition error on {device}: {message}")]
    Acquisition {
        /// Sensor identifier
        device: String,
        /// Driver message
        message: String,
    },
}

impl SensorReadError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SensorReadError::Disconnected(_) => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Create a timeout error.
    pub fn timeout(device: impl Into<String>, timeout_ms: u64) -> Self {
        SensorReadError::Timeout {
            device: device.into(),
            timeout_ms,
        }
    }

    /// Create a disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        SensorReadError::Disconnected(device.into())
    }

    /// Create an invalid reading error.
    pub fn invalid_reading(device: impl Into<String>, reason: impl Into<String>) -> Self {
        SensorReadError::InvalidReading {
            device: device.into(),
            reason: reason.into(),
        }
    }
}

/// The motor controller rejected or failed a command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActuatorCommandError {
    /// The actuator is not connected
    #[error("Actuator {0} is not connected")]
    NotConnected(String),

    /// The controller refused the command
    #[error("Actuator {device} rejected {command}: {reason}")]
    Rejected {
        /// Actuator identifier
        device: String,
        /// Command name
        command: &'static str,
        /// Rejection reason
        reason: String,
    },

    /// The command was not acknowledged in time
    #[error("Actuator {device} timeout after {timeout_ms}ms")]
    Timeout {
        /// Actuator identifier
        device: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Transport level failure
    #[error("Communication error with actuator {device}: {message}")]
    Communication {
        /// Actuator identifier
        device: String,
        /// Error message
        message: String,
    },
}

impl ActuatorCommandError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ActuatorCommandError::Timeout { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Check if repeating the command might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActuatorCommandError::Timeout { .. } | ActuatorCommandError::Communication { .. }
        )
    }

    /// Create a not connected error.
    pub fn not_connected(device: impl Into<String>) -> Self {
        ActuatorCommandError::NotConnected(device.into())
    }

    /// Create a rejected command error.
    pub fn rejected(
        device: impl Into<String>,
        command: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        ActuatorCommandError::Rejected {
            device: device.into(),
            command,
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(device: impl Into<String>, timeout_ms: u64) -> Self {
        ActuatorCommandError::Timeout {
            device: device.into(),
            timeout_ms,
        }
    }

    /// Create a communication error.
    pub fn communication(device: impl Into<String>, message: impl Into<String>) -> Self {
        ActuatorCommandError::Communication {
            device: device.into(),
            message: message.into(),
        }
    }
}

/// One device that failed during hardware activation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFailure {
    /// Device name as reported by the adapter
    pub device: String,
    /// Why it failed
    pub error: DeviceError,
}

impl DeviceFailure {
    /// Create a new failure record.
    pub fn new(device: impl Into<String>, error: DeviceError) -> Self {
        Self {
            device: device.into(),
            error,
        }
    }
}

impl fmt::Display for DeviceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.device, self.error)
    }
}

/// Hardware activation failed for at least one device.
///
/// Every failed device is listed. Devices that did connect have already been
/// disconnected again when this error is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Hardware activation failed for {} device(s): {}", .failures.len(), join_failures(.failures))]
pub struct ActivationError {
    /// Every device that failed to connect
    pub failures: Vec<DeviceFailure>,
}

impl ActivationError {
    /// Create an activation error from a list of failures.
    pub fn new(failures: Vec<DeviceFailure>) -> Self {
        Self { failures }
    }

    /// Names of the failed devices, in connection order.
    pub fn failed_devices(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.device.as_str())
    }
}

fn join_failures(failures: &[DeviceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
