//! Absolute-deadline tick scheduler.

use crate::error::{SchedError, SchedResult};
use crate::lateness::LatenessMetrics;
use core::time::Duration;
use std::time::Instant;
use tracing::{debug, warn};

/// One scheduled wakeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based tick index since the scheduler was created or reset
    pub index: u64,
    /// Deadline this tick was scheduled for
    pub deadline: Instant,
    /// How late the wakeup was relative to `deadline`
    pub lateness: Duration,
}

/// Absolute scheduler for a fixed tick period.
///
/// Deadlines are computed from the first tick as `anchor + n * period`, so
/// time spent inside a tick does not push later ticks back. The first call
/// to [`wait_for_tick`](Self::wait_for_tick) returns immediately and sets the
/// anchor.
///
/// If a tick finishes after the next deadline has already passed, the next
/// tick starts immediately. If it finishes more than a full period late, the
/// missed deadlines are dropped and the schedule re-anchors on the current
/// time.
#[derive(Debug)]
pub struct TickScheduler {
    period: Duration,
    next_deadline: Option<Instant>,
    tick_count: u64,
    overrun_limit: Duration,
    metrics: LatenessMetrics,
}

impl TickScheduler {
    /// Create a scheduler with the default 100 ms period.
    pub fn new() -> Self {
        Self::with_period(crate::DEFAULT_PERIOD)
    }

    /// Create a scheduler with a custom period.
    ///
    /// A zero period is raised to one millisecond.
    pub fn with_period(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        Self {
            period,
            next_deadline: None,
            tick_count: 0,
            overrun_limit: period,
            metrics: LatenessMetrics::new(),
        }
    }

    /// Create a scheduler, rejecting a zero period.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::InvalidPeriod`] if `period` is zero.
    pub fn try_with_period(period: Duration) -> SchedResult<Self> {
        if period.is_zero() {
            return Err(SchedError::InvalidPeriod);
        }
        Ok(Self::with_period(period))
    }

    /// Set the lateness above which a wakeup is reported as a violation.
    ///
    /// Defaults to one period.
    pub fn with_overrun_limit(mut self, limit: Duration) -> Self {
        self.overrun_limit = limit;
        self
    }

    /// Block until the next deadline and return the tick.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::TimingViolation`] when the wakeup is later than
    /// the overrun limit. The schedule has already advanced in that case and
    /// the caller should still run the tick.
    pub fn wait_for_tick(&mut self) -> SchedResult<Tick> {
        let deadline = match self.next_deadline {
            Some(deadline) => deadline,
            None => {
                let now = Instant::now();
                self.next_deadline = Some(now);
                now
            }
        };

        sleep_until(deadline);

        let woke = Instant::now();
        let lateness = woke.saturating_duration_since(deadline);
        let missed = lateness >= self.period;

        // Drop whole periods we slept through instead of bursting to catch up.
        let skipped = if missed {
            let behind = lateness.as_nanos() / self.period.as_nanos().max(1);
            u64::try_from(behind).unwrap_or(u64::MAX)
        } else {
            0
        };
        self.next_deadline = Some(if missed {
            woke + self.period
        } else {
            deadline + self.period
        });

        self.tick_count = self.tick_count.saturating_add(1);
        self.metrics.record(lateness, missed, skipped);

        let tick = Tick {
            index: self.tick_count,
            deadline,
            lateness,
        };

        if skipped > 0 {
            debug!(
                tick = tick.index,
                skipped, "re-anchored schedule after overrun"
            );
        }

        if lateness > self.overrun_limit {
            warn!(
                tick = tick.index,
                lateness_ms = lateness.as_millis() as u64,
                "tick started late"
            );
            return Err(SchedError::TimingViolation {
                tick: tick.index,
                lateness,
            });
        }

        Ok(tick)
    }

    /// Current tick count.
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Target period.
    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Deadline of the next tick, if the schedule has been anchored.
    #[inline]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// Lateness statistics.
    #[inline]
    pub fn metrics(&self) -> &LatenessMetrics {
        &self.metrics
    }

    /// Forget the anchor and all statistics.
    ///
    /// The next [`wait_for_tick`](Self::wait_for_tick) returns immediately.
    pub fn reset(&mut self) {
        self.next_deadline = None;
        self.tick_count = 0;
        self.metrics.reset();
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep until `target`, spinning through the final [`SPIN_TAIL`](crate::SPIN_TAIL).
fn sleep_until(target: Instant) {
    let now = Instant::now();
    if target <= now {
        return;
    }
    let remaining = target.duration_since(now);
    if remaining > crate::SPIN_TAIL {
        std::thread::sleep(remaining.saturating_sub(crate::SPIN_TAIL));
    }
    while Instant::now() < target {
        std::hint::spin_loop();
    }
}
