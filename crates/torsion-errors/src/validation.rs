//! Parameter and configuration validation errors.

use core::fmt;

use crate::common::ErrorSeverity;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Value out of range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Value is not a finite number
    #[error("{0} must be a finite number")]
    NotFinite(String),

    /// Value is required but missing
    #[error("Required field '{0}' is missing")]
    Required(String),

    /// Invalid format
    #[error("Invalid format for field '{field}': {reason}")]
    InvalidFormat {
        /// Field name
        field: String,
        /// Reason for the format error
        reason: String,
    },

    /// Two or more settings contradict each other
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl ValidationError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    /// Create an out of range error for a numeric value.
    pub fn out_of_range<T: fmt::Display>(field: impl Into<String>, value: T, min: T, max: T) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Create a not finite error.
    pub fn not_finite(field: impl Into<String>) -> Self {
        ValidationError::NotFinite(field.into())
    }

    /// Create a required field error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required(field.into())
    }

    /// Create an invalid format error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a constraint violation error.
    pub fn constraint(msg: impl Into<String>) -> Self {
        ValidationError::ConstraintViolation(msg.into())
    }
}

/// Check that `value` is finite and not negative.
///
/// # Errors
///
/// Returns [`ValidationError::NotFinite`] or [`ValidationError::OutOfRange`].
pub fn non_negative(field: &str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::not_finite(field));
    }
    if value < 0.0 {
        return Err(ValidationError::out_of_range(field, value, 0.0, f64::MAX));
    }
    Ok(value)
}

/// Check that `value` is finite.
///
/// # Errors
///
/// Returns [`ValidationError::NotFinite`].
pub fn finite(field: &str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::not_finite(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = ValidationError::out_of_range("max_angle", -5.0, 0.0, 720.0);
        let msg = err.to_string();
        assert!(msg.contains("max_angle"));
        assert!(msg.contains("-5"));
    }

    #[test]
    fn test_non_negative() {
        assert!(non_negative("max_torque", 15.0).is_ok());
        assert!(non_negative("max_torque", 0.0).is_ok());
        assert!(matches!(
            non_negative("max_torque", -0.1),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            non_negative("max_torque", f64::NAN),
            Err(ValidationError::NotFinite(_))
        ));
    }

    #[test]
    fn test_finite() {
        assert!(finite("velocity", -10.0).is_ok());
        assert!(finite("velocity", f64::INFINITY).is_err());
    }
}
