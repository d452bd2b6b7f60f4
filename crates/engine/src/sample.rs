//! Per-tick samples and run parameters.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use torsion_config::{RunDefaults, SamplingConfig};
use torsion_errors::ValidationError;
use torsion_errors::validation::{finite, non_negative};

/// One acquired data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Position in the run, starting at 0
    pub index: u64,
    /// Time since the run started
    pub elapsed: Duration,
    /// Torque channel voltage (zero offset applied)
    pub torque_voltage: f64,
    /// Angle channel voltage, or the motor position in degrees when the
    /// motor is the angle source
    pub angle_signal: f64,
    /// Torque in Nm
    pub torque: f64,
    /// Continuous angle in degrees
    pub angle: f64,
}

/// Limits and speed of one run. Fixed for the duration of the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Angle limit in degrees, applied symmetrically
    pub max_angle: f64,
    /// Torque limit in Nm, applied symmetrically
    pub max_torque: f64,
    /// Rotation speed in deg/s; the sign selects the direction
    pub velocity: f64,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self::from_defaults(&RunDefaults::default())
    }
}

impl RunParameters {
    /// New parameter set.
    pub fn new(max_angle: f64, max_torque: f64, velocity: f64) -> Self {
        Self {
            max_angle,
            max_torque,
            velocity,
        }
    }

    /// Parameters from the configured run defaults.
    pub fn from_defaults(defaults: &RunDefaults) -> Self {
        Self::new(
            defaults.max_angle_deg,
            defaults.max_torque_nm,
            defaults.velocity_deg_s,
        )
    }

    /// Check that every value is finite and both limits are non-negative.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("max_angle", self.max_angle)?;
        non_negative("max_torque", self.max_torque)?;
        finite("velocity", self.velocity)?;
        Ok(())
    }

    /// Check that the speed can be unwrapped at the given sampling settings.
    ///
    /// Travel per tick must stay strictly below the wrap threshold.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation naming the fastest usable speed.
    pub fn check_trackable(&self, sampling: &SamplingConfig) -> Result<(), ValidationError> {
        let limit = sampling.max_trackable_velocity();
        if self.velocity.abs() >= limit {
            return Err(ValidationError::constraint(format!(
                "velocity {} deg/s travels at least {} deg per {} ms tick; keep it below {limit} deg/s",
                self.velocity, sampling.wrap_threshold_deg, sampling.period_ms
            )));
        }
        Ok(())
    }
}

/// Describes one run; written once at the top of its record.
#[derive(Debug, Clone, PartialEq)]
pub struct RunHeader {
    /// Wall-clock start
    pub started_at: DateTime<Local>,
    /// Sample (specimen) name as entered
    pub sample_name: String,
    /// Run parameters
    pub parameters: RunParameters,
    /// Torque conversion factor in Nm/V
    pub torque_scale: f64,
    /// Tick period
    pub period: Duration,
}
