//! Wakeup lateness tracking.
//!
//! Lateness is how far after its deadline a tick actually started. Early
//! wakeups are impossible by construction (the scheduler sleeps until the
//! deadline), so only non-negative values are recorded.

use core::time::Duration;

/// Default ring buffer size: ten minutes of ticks at 100 ms.
const DEFAULT_WINDOW: usize = 6_000;

/// Lateness statistics for a [`TickScheduler`](crate::TickScheduler).
///
/// Percentiles are computed over a bounded window of recent ticks; counters
/// cover the whole lifetime since the last [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct LatenessMetrics {
    /// Total ticks recorded
    pub total_ticks: u64,

    /// Ticks that started after their deadline by at least one period
    pub missed_ticks: u64,

    /// Deadline slots that were dropped instead of replayed
    pub skipped_slots: u64,

    /// Largest lateness observed
    pub max_lateness: Duration,

    /// Lateness of the most recent tick
    pub last_lateness: Duration,

    window: Vec<Duration>,
    capacity: usize,
    cursor: usize,
}

impl Default for LatenessMetrics {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_WINDOW)
    }
}

impl LatenessMetrics {
    /// Create metrics with the default window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create metrics keeping `capacity` recent samples for percentiles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            total_ticks: 0,
            missed_ticks: 0,
            skipped_slots: 0,
            max_lateness: Duration::ZERO,
            last_lateness: Duration::ZERO,
            window: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    /// Record one tick.
    pub fn record(&mut self, lateness: Duration, missed: bool, skipped_slots: u64) {
        self.total_ticks = self.total_ticks.saturating_add(1);
        if missed {
            self.missed_ticks = self.missed_ticks.saturating_add(1);
        }
        self.skipped_slots = self.skipped_slots.saturating_add(skipped_slots);
        self.max_lateness = self.max_lateness.max(lateness);
        self.last_lateness = lateness;

        if self.capacity == 0 {
            return;
        }
        if self.window.len() < self.capacity {
            self.window.push(lateness);
        } else if let Some(slot) = self.window.get_mut(self.cursor) {
            *slot = lateness;
            self.cursor = (self.cursor + 1) % self.capacity;
        }
    }

    /// Lateness at `percentile` (0.0 to 1.0) over the recent window.
    ///
    /// Returns zero when nothing has been recorded.
    pub fn percentile(&self, percentile: f64) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        let mut scratch = self.window.clone();
        let len = scratch.len();
        let rank = (len as f64 * percentile.clamp(0.0, 1.0)) as usize;
        let index = rank.min(len.saturating_sub(1));
        let (_, value, _) = scratch.select_nth_unstable(index);
        *value
    }

    /// Median lateness.
    pub fn p50(&self) -> Duration {
        self.percentile(0.50)
    }

    /// 99th percentile lateness.
    pub fn p99(&self) -> Duration {
        self.percentile(0.99)
    }

    /// Fraction of ticks that missed their slot (0.0 to 1.0).
    pub fn missed_rate(&self) -> f64 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.missed_ticks as f64 / self.total_ticks as f64
        }
    }

    /// Number of samples in the percentile window.
    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    /// Clear all statistics.
    pub fn reset(&mut self) {
        *self = Self::with_capacity(self.capacity);
    }
}
