//! State machine usage errors.

/// An operation was requested in a state that does not permit it.
///
/// The request is rejected synchronously; no state changes and no hardware
/// is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transition: {operation} is not allowed while {from}")]
pub struct InvalidTransitionError {
    /// State the machine was in
    pub from: &'static str,
    /// Operation that was attempted
    pub operation: &'static str,
}

impl InvalidTransitionError {
    /// Create a new invalid transition error.
    pub fn new(from: &'static str, operation: &'static str) -> Self {
        Self { from, operation }
    }
}
