//! Data sink errors.

/// A sample could not be made durable.
///
/// Losing samples while the motor keeps turning is never acceptable, so the
/// sampling loop stops the run when it sees this error.
#[derive(Debug, thiserror::Error)]
pub enum DurabilityError {
    /// The underlying write or sync failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path of the record being written
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The sink has already been closed
    #[error("Data sink {0} is closed")]
    Closed(String),

    /// The record could not be encoded
    #[error("Could not encode record: {0}")]
    Format(String),
}

impl DurabilityError {
    /// Create an I/O error for a record path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        DurabilityError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a closed sink error.
    pub fn closed(sink: impl Into<String>) -> Self {
        DurabilityError::Closed(sink.into())
    }
}
