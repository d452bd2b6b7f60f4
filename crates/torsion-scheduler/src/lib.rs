//! Fixed-period tick scheduling for the measurement control thread.
//!
//! The sampling loop runs one tick per period (100 ms by default). This crate
//! provides the clock side of that contract:
//!
//! - **TickScheduler**: absolute-deadline wakeups, so per-tick work never
//!   accumulates into drift
//! - **LatenessMetrics**: how late each wakeup was, with percentile estimates
//!
//! The scheduler never runs two ticks at once. The caller runs a tick to
//! completion and only then calls [`TickScheduler::wait_for_tick`] again. If
//! a tick overruns by more than a whole period the missed slots are skipped
//! rather than replayed back to back.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use torsion_scheduler::TickScheduler;
//!
//! let mut scheduler = TickScheduler::with_period(Duration::from_millis(100));
//!
//! loop {
//!     match scheduler.wait_for_tick() {
//!         Ok(tick) => { let _ = tick.index; /* sample here */ }
//!         Err(e) => eprintln!("late: {e}"),
//!     }
//! #   break;
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(unused_must_use)]

pub mod error;
pub mod lateness;
pub mod prelude;
pub mod scheduler;

pub use error::{SchedError, SchedResult};
pub use lateness::LatenessMetrics;
pub use scheduler::{Tick, TickScheduler};

use core::time::Duration;

/// Default measurement period (100 ms).
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Remaining sleep below which the scheduler spins instead of sleeping.
pub const SPIN_TAIL: Duration = Duration::from_micros(200);
