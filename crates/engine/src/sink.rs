//! Where samples go.

use torsion_errors::DurabilityError;

use crate::sample::{RunHeader, Sample};

/// Append-only destination for the samples of one run.
///
/// `append` must not return before the sample is durable; a crash may at
/// worst lose the sample being written, never earlier ones. Dropping the
/// sink closes it.
pub trait DataSink: Send {
    /// Store one sample.
    ///
    /// # Errors
    ///
    /// Returns a [`DurabilityError`] if the sample could not be made durable.
    /// The running measurement is stopped in response.
    fn append(&mut self, sample: &Sample) -> Result<(), DurabilityError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String {
        String::from("data sink")
    }

    /// Give up a sink whose run never started. Implementations may remove
    /// what [`SinkFactory::open_run`] created; the default just closes it.
    fn discard(self: Box<Self>) {}
}

/// Opens one [`DataSink`] per run.
pub trait SinkFactory: Send {
    /// Create the sink for a new run and write its header.
    ///
    /// # Errors
    ///
    /// Returns a [`DurabilityError`] if the destination cannot be created.
    fn open_run(&mut self, header: &RunHeader) -> Result<Box<dyn DataSink>, DurabilityError>;
}
