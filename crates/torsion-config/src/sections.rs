//! Configuration sections.

use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use torsion_errors::ValidationError;
use torsion_errors::validation::{finite, non_negative};

/// Where the continuous angle comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleSource {
    /// Single-turn absolute angle sensor, unwrapped in software
    #[default]
    Sensor,
    /// Multi-turn position reported by the motor controller
    MotorPosition,
}

/// Sampling loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Tick period in milliseconds
    pub period_ms: u64,
    /// Longest acceptable sensor read in milliseconds
    pub read_timeout_ms: u64,
    /// Raw angle jump that counts as a wrap, in degrees
    pub wrap_threshold_deg: f64,
    /// Angle source
    pub angle_source: AngleSource,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            period_ms: 100,
            read_timeout_ms: 20,
            wrap_threshold_deg: 180.0,
            angle_source: AngleSource::Sensor,
        }
    }
}

impl SamplingConfig {
    /// Tick period.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Sensor read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Fastest rotation (deg/s) the unwrapper can follow at this period.
    ///
    /// Travel per tick must stay strictly below the wrap threshold.
    pub fn max_trackable_velocity(&self) -> f64 {
        let period_s = self.period().as_secs_f64();
        if period_s <= 0.0 {
            return 0.0;
        }
        self.wrap_threshold_deg / period_s
    }

    /// Builder: set the tick period.
    pub fn with_period_ms(mut self, period_ms: u64) -> Self {
        self.period_ms = period_ms;
        self
    }

    /// Builder: set the angle source.
    pub fn with_angle_source(mut self, source: AngleSource) -> Self {
        self.angle_source = source;
        self
    }

    /// Validate the section.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a zero period, a read timeout not
    /// shorter than the period, or a wrap threshold outside (0, 360).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.period_ms == 0 || self.period_ms > 10_000 {
            return Err(ValidationError::out_of_range(
                "sampling.period_ms",
                self.period_ms,
                1,
                10_000,
            ));
        }
        if self.read_timeout_ms >= self.period_ms {
            return Err(ValidationError::constraint(format!(
                "sampling.read_timeout_ms ({}) must be shorter than the period ({} ms)",
                self.read_timeout_ms, self.period_ms
            )));
        }
        let threshold = finite("sampling.wrap_threshold_deg", self.wrap_threshold_deg)?;
        if threshold <= 0.0 || threshold >= 360.0 {
            return Err(ValidationError::out_of_range(
                "sampling.wrap_threshold_deg",
                threshold,
                0.0,
                360.0,
            ));
        }
        Ok(())
    }
}

/// Torque channel of the DAQ board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorqueChannelConfig {
    /// Physical channel name
    pub channel: String,
    /// Lowest input voltage
    pub voltage_min: f64,
    /// Highest input voltage
    pub voltage_max: f64,
    /// Conversion factor in Nm per volt
    pub scale_nm_per_volt: f64,
    /// Rated range of the torque cell in Nm (symmetric)
    pub rated_torque_nm: f64,
}

impl Default for TorqueChannelConfig {
    fn default() -> Self {
        // DF-30 torque cell: +-20 Nm over +-10 V.
        Self {
            channel: "Dev1/ai0".to_string(),
            voltage_min: -10.0,
            voltage_max: 10.0,
            scale_nm_per_volt: 2.0,
            rated_torque_nm: 20.0,
        }
    }
}

impl TorqueChannelConfig {
    /// Builder: set the Nm/V factor.
    pub fn with_scale(mut self, scale_nm_per_volt: f64) -> Self {
        self.scale_nm_per_volt = scale_nm_per_volt;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.channel.trim().is_empty() {
            return Err(ValidationError::required("torque_channel.channel"));
        }
        finite("torque_channel.voltage_min", self.voltage_min)?;
        finite("torque_channel.voltage_max", self.voltage_max)?;
        if self.voltage_max <= self.voltage_min {
            return Err(ValidationError::constraint(
                "torque_channel.voltage_max must be above voltage_min",
            ));
        }
        let scale = finite("torque_channel.scale_nm_per_volt", self.scale_nm_per_volt)?;
        if scale == 0.0 {
            return Err(ValidationError::constraint(
                "torque_channel.scale_nm_per_volt must be non-zero",
            ));
        }
        non_negative("torque_channel.rated_torque_nm", self.rated_torque_nm)?;
        Ok(())
    }
}

/// Angle channel of the DAQ board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleChannelConfig {
    /// Physical channel name
    pub channel: String,
    /// Voltage at `angle_min`
    pub voltage_min: f64,
    /// Voltage at `angle_max`
    pub voltage_max: f64,
    /// Angle at `voltage_min` in degrees
    pub angle_min: f64,
    /// Angle at `voltage_max` in degrees
    pub angle_max: f64,
}

impl Default for AngleChannelConfig {
    fn default() -> Self {
        Self {
            channel: "Dev1/ai1".to_string(),
            voltage_min: 0.0,
            voltage_max: 10.0,
            angle_min: 0.0,
            angle_max: 360.0,
        }
    }
}

impl AngleChannelConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.channel.trim().is_empty() {
            return Err(ValidationError::required("angle_channel.channel"));
        }
        finite("angle_channel.voltage_min", self.voltage_min)?;
        finite("angle_channel.voltage_max", self.voltage_max)?;
        finite("angle_channel.angle_min", self.angle_min)?;
        finite("angle_channel.angle_max", self.angle_max)?;
        if self.voltage_max <= self.voltage_min {
            return Err(ValidationError::constraint(
                "angle_channel.voltage_max must be above voltage_min",
            ));
        }
        if self.angle_min < 0.0 || self.angle_max > 360.0 || self.angle_max <= self.angle_min {
            return Err(ValidationError::constraint(
                "angle_channel must map into [0, 360] degrees with angle_max above angle_min",
            ));
        }
        Ok(())
    }
}

/// Motor controller backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotorBackend {
    /// Built-in simulated motor
    #[default]
    Simulated,
    /// CiA-402 drive in profile velocity mode
    Cia402 {
        /// CANopen / EtherCAT node id
        node_id: u8,
        /// Encoder counts per motor revolution
        encoder_counts_per_rev: u32,
        /// Status word polls allowed while homing
        homing_poll_limit: u32,
    },
}

/// Motor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Backend selection
    pub backend: MotorBackend,
    /// Timeout for a single command acknowledgement in milliseconds
    pub command_timeout_ms: u64,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            backend: MotorBackend::Simulated,
            command_timeout_ms: 500,
        }
    }
}

/// Stop handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// How many times `stop` is sent before declaring a hard fault
    pub stop_attempts: u32,
    /// Pause between stop attempts in milliseconds
    pub stop_retry_delay_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            stop_attempts: 3,
            stop_retry_delay_ms: 20,
        }
    }
}

impl SafetyConfig {
    /// Pause between stop attempts.
    pub fn stop_retry_delay(&self) -> Duration {
        Duration::from_millis(self.stop_retry_delay_ms)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.stop_attempts == 0 || self.stop_attempts > 10 {
            return Err(ValidationError::out_of_range(
                "safety.stop_attempts",
                self.stop_attempts,
                1,
                10,
            ));
        }
        if self.stop_retry_delay_ms > 1_000 {
            return Err(ValidationError::out_of_range(
                "safety.stop_retry_delay_ms",
                self.stop_retry_delay_ms,
                0,
                1_000,
            ));
        }
        Ok(())
    }
}

/// Run parameters offered to the operator when nothing else is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    /// Sample (specimen) name
    pub sample_name: String,
    /// Angle limit in degrees
    pub max_angle_deg: f64,
    /// Torque limit in Nm
    pub max_torque_nm: f64,
    /// Rotation speed in deg/s; the sign selects the direction
    pub velocity_deg_s: f64,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            sample_name: "Sample".to_string(),
            max_angle_deg: 360.0,
            max_torque_nm: 15.0,
            velocity_deg_s: 10.0,
        }
    }
}

impl RunDefaults {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.sample_name.trim().is_empty() {
            return Err(ValidationError::required("run.sample_name"));
        }
        non_negative("run.max_angle_deg", self.max_angle_deg)?;
        non_negative("run.max_torque_nm", self.max_torque_nm)?;
        finite("run.velocity_deg_s", self.velocity_deg_s)?;
        Ok(())
    }
}

/// Where run records are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Root directory; each run gets its own folder below it
    pub output_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("measurements"),
        }
    }
}

/// Simulated bench behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Specimen stiffness in Nm per degree
    pub stiffness_nm_per_deg: f64,
    /// Peak amplitude of uniform torque noise in Nm
    pub noise_nm: f64,
    /// Seed for the noise generator
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            stiffness_nm_per_deg: 0.05,
            noise_nm: 0.1,
            seed: 0x5EED,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        finite("simulation.stiffness_nm_per_deg", self.stiffness_nm_per_deg)?;
        non_negative("simulation.noise_nm", self.noise_nm)?;
        Ok(())
    }
}

pub(crate) fn validate_sections(
    sampling: &SamplingConfig,
    torque: &TorqueChannelConfig,
    angle: &AngleChannelConfig,
    safety: &SafetyConfig,
    run: &RunDefaults,
    simulation: &SimulationConfig,
) -> Result<(), ValidationError> {
    sampling.validate()?;
    torque.validate()?;
    angle.validate()?;
    safety.validate()?;
    run.validate()?;
    simulation.validate()?;
    Ok(())
}
