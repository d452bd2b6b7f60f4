//! Single-turn to multi-turn angle unwrapping.

/// Raw-angle jump (degrees) treated as a wrap unless configured otherwise.
pub const DEFAULT_WRAP_THRESHOLD: f64 = 180.0;

/// Degrees per revolution.
pub const FULL_TURN: f64 = 360.0;

/// Turns a bounded [0, 360) angle signal into a continuous angle.
///
/// A jump between consecutive raw readings larger than the wrap threshold is
/// taken as the signal crossing 360°/0°: a large negative jump counts one
/// forward turn, a large positive jump one backward turn. The unwrapper
/// cannot detect motion faster than `threshold` degrees per sample; callers
/// must keep `|velocity| * period` below it.
///
/// After construction or [`reset`](Self::reset) the first reading becomes
/// the reference and is returned unchanged.
///
/// After every [`unwrap`](Self::unwrap):
/// `continuous_angle == previous_raw_angle + 360 * turn_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleUnwrapper {
    previous_raw_angle: f64,
    turn_count: i64,
    continuous_angle: f64,
    wrap_threshold: f64,
    primed: bool,
}

impl Default for AngleUnwrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl AngleUnwrapper {
    /// Unwrapper with the default 180° threshold.
    pub fn new() -> Self {
        Self::with_wrap_threshold(DEFAULT_WRAP_THRESHOLD)
    }

    /// Unwrapper with a custom threshold in degrees.
    pub fn with_wrap_threshold(wrap_threshold: f64) -> Self {
        Self {
            previous_raw_angle: 0.0,
            turn_count: 0,
            continuous_angle: 0.0,
            wrap_threshold,
            primed: false,
        }
    }

    /// Feed one raw reading and return the continuous angle.
    ///
    /// A non-finite reading leaves the state untouched and returns the last
    /// continuous angle.
    pub fn unwrap(&mut self, raw_angle: f64) -> f64 {
        if !raw_angle.is_finite() {
            return self.continuous_angle;
        }
        if self.primed {
            let delta = raw_angle - self.previous_raw_angle;
            if delta < -self.wrap_threshold {
                self.turn_count = self.turn_count.saturating_add(1);
            } else if delta > self.wrap_threshold {
                self.turn_count = self.turn_count.saturating_sub(1);
            }
        }
        self.primed = true;
        self.continuous_angle = raw_angle + FULL_TURN * self.turn_count as f64;
        self.previous_raw_angle = raw_angle;
        self.continuous_angle
    }

    /// Forget all history. Required whenever the physical reference changes.
    pub fn reset(&mut self) {
        self.previous_raw_angle = 0.0;
        self.turn_count = 0;
        self.continuous_angle = 0.0;
        self.primed = false;
    }

    /// Completed revolutions, signed.
    pub fn turn_count(&self) -> i64 {
        self.turn_count
    }

    /// Angle returned by the last [`unwrap`](Self::unwrap).
    pub fn continuous_angle(&self) -> f64 {
        self.continuous_angle
    }

    /// Raw reading passed to the last [`unwrap`](Self::unwrap).
    pub fn previous_raw_angle(&self) -> f64 {
        self.previous_raw_angle
    }

    /// Jump size treated as a wrap.
    pub fn wrap_threshold(&self) -> f64 {
        self.wrap_threshold
    }
}
