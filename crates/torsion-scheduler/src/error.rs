//! Error types for the scheduler crate.

use core::fmt;
use core::time::Duration;

/// Scheduling errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// A wakeup arrived later than the configured overrun limit.
    ///
    /// The tick is still due and should still run.
    TimingViolation {
        /// Tick index that was late
        tick: u64,
        /// How far past its deadline the wakeup was
        lateness: Duration,
    },
    /// The requested period cannot be scheduled
    InvalidPeriod,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::TimingViolation { tick, lateness } => {
                write!(f, "Tick {tick} started {} ms late", lateness.as_millis())
            }
            SchedError::InvalidPeriod => write!(f, "Tick period must be non-zero"),
        }
    }
}

impl std::error::Error for SchedError {}

/// Scheduler result type
pub type SchedResult<T = ()> = Result<T, SchedError>;
