//! Linear voltage to physical value mapping.

use torsion_config::{AngleChannelConfig, TorqueChannelConfig};

const FULL_TURN: f64 = 360.0;

/// Maps a voltage range linearly onto a value range.
///
/// Inputs outside the voltage range are clamped to the value range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    /// Voltage at `value_min`
    pub voltage_min: f64,
    /// Voltage at `value_max`
    pub voltage_max: f64,
    /// Value at `voltage_min`
    pub value_min: f64,
    /// Value at `voltage_max`
    pub value_max: f64,
}

impl LinearScale {
    /// Create a new mapping.
    pub const fn new(voltage_min: f64, voltage_max: f64, value_min: f64, value_max: f64) -> Self {
        Self {
            voltage_min,
            voltage_max,
            value_min,
            value_max,
        }
    }

    /// Angle channel mapping from configuration.
    pub fn for_angle(config: &AngleChannelConfig) -> Self {
        Self::new(
            config.voltage_min,
            config.voltage_max,
            config.angle_min,
            config.angle_max,
        )
    }

    /// Torque channel mapping from configuration.
    ///
    /// The value range is the voltage range times the Nm/V factor.
    pub fn for_torque(config: &TorqueChannelConfig) -> Self {
        Self::new(
            config.voltage_min,
            config.voltage_max,
            config.voltage_min * config.scale_nm_per_volt,
            config.voltage_max * config.scale_nm_per_volt,
        )
    }

    /// Convert a voltage to a value, clamped to the value range.
    ///
    /// A degenerate voltage range maps everything to `value_min`.
    pub fn to_value(&self, voltage: f64) -> f64 {
        let voltage_span = self.voltage_max - self.voltage_min;
        if voltage_span.abs() < f64::EPSILON {
            return self.value_min;
        }
        let value_span = self.value_max - self.value_min;
        let value = (voltage - self.voltage_min) / voltage_span * value_span + self.value_min;
        clamp_between(value, self.value_min, self.value_max)
    }

    /// Convert a value back to a voltage, clamped to the voltage range.
    pub fn to_voltage(&self, value: f64) -> f64 {
        let value_span = self.value_max - self.value_min;
        if value_span.abs() < f64::EPSILON {
            return self.voltage_min;
        }
        let voltage_span = self.voltage_max - self.voltage_min;
        let voltage = (value - self.value_min) / value_span * voltage_span + self.voltage_min;
        clamp_between(voltage, self.voltage_min, self.voltage_max)
    }

    /// Convert a voltage to a raw angle in [0, 360).
    ///
    /// The top of the range (360°) is the same shaft position as 0°.
    pub fn to_raw_angle(&self, voltage: f64) -> f64 {
        normalize_angle(self.to_value(voltage))
    }

    /// Convert an angle to the channel voltage, wrapping it into one turn first.
    pub fn angle_to_voltage(&self, angle: f64) -> f64 {
        self.to_voltage(normalize_angle(angle))
    }
}

/// Wrap any finite angle into [0, 360).
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(FULL_TURN);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= FULL_TURN { 0.0 } else { wrapped }
}

fn clamp_between(value: f64, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    value.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angle_scale() -> LinearScale {
        LinearScale::for_angle(&AngleChannelConfig::default())
    }

    #[test]
    fn test_angle_mapping() {
        let scale = angle_scale();
        assert!((scale.to_value(0.0) - 0.0).abs() < 1e-12);
        assert!((scale.to_value(5.0) - 180.0).abs() < 1e-12);
        assert!((scale.to_value(2.5) - 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_voltage_is_clamped() {
        let scale = angle_scale();
        assert!((scale.to_value(-1.0) - 0.0).abs() < 1e-12);
        assert!((scale.to_value(11.0) - 360.0).abs() < 1e-12);
    }

    #[test]
    fn test_full_scale_is_zero_raw_angle() {
        let scale = angle_scale();
        assert!(scale.to_raw_angle(10.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_range() {
        let scale = LinearScale::new(1.0, 1.0, 5.0, 10.0);
        assert!((scale.to_value(3.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_angle_to_voltage_wraps() {
        let scale = angle_scale();
        assert!((scale.angle_to_voltage(450.0) - 2.5).abs() < 1e-12);
        assert!((scale.angle_to_voltage(-90.0) - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_torque_mapping() {
        let scale = LinearScale::for_torque(&TorqueChannelConfig::default());
        assert!((scale.to_value(7.5) - 15.0).abs() < 1e-12);
        assert!((scale.to_value(-7.5) + 15.0).abs() < 1e-12);
        assert!((scale.to_voltage(-20.0) + 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(725.0) - 5.0).abs() < 1e-9);
        assert!((normalize_angle(-5.0) - 355.0).abs() < 1e-9);
        assert!(normalize_angle(-1e-20) < FULL_TURN);
    }
}
