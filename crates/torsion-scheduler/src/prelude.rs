//! Convenience re-exports.

pub use crate::{
    DEFAULT_PERIOD, LatenessMetrics, SchedError, SchedResult, Tick, TickScheduler,
};
