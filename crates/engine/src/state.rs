//! Measurement states, stop reasons and operator alerts.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use torsion_errors::ErrorSeverity;

/// State of the measurement state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum MeasurementState {
    /// No hardware connected
    #[default]
    Idle,
    /// Hardware connected, motor not commanded to move
    HardwareActive,
    /// Motor moving, sampling loop recording
    Running,
    /// A limit or fault ended the last run. Behaves like `HardwareActive`.
    Stopped,
}

impl MeasurementState {
    /// Name used in logs and transition errors.
    pub const fn as_str(self) -> &'static str {
        match self {
            MeasurementState::Idle => "Idle",
            MeasurementState::HardwareActive => "HardwareActive",
            MeasurementState::Running => "Running",
            MeasurementState::Stopped => "Stopped",
        }
    }

    /// Hardware connected and motor idle.
    pub const fn is_ready(self) -> bool {
        matches!(
            self,
            MeasurementState::HardwareActive | MeasurementState::Stopped
        )
    }
}

impl fmt::Display for MeasurementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StopReason {
    /// The operator asked for it
    Operator,
    /// The continuous angle reached the limit
    AngleLimit {
        /// Angle that tripped the limit, degrees
        angle: f64,
        /// Configured limit, degrees
        limit: f64,
    },
    /// The torque reached the limit
    TorqueLimit {
        /// Torque that tripped the limit, Nm
        torque: f64,
        /// Configured limit, Nm
        limit: f64,
    },
    /// A sample could not be stored
    Durability {
        /// Sink error message
        detail: String,
    },
    /// Too many consecutive angle reads failed for the unwrapper to keep
    /// counting turns at the run's speed
    AngleTrackingLost {
        /// Consecutive failed angle reads
        missed_reads: u32,
    },
    /// Hardware was deactivated during the run
    Deactivated,
}

impl StopReason {
    /// Whether the stop was forced by a condition or fault rather than asked
    /// for.
    pub fn is_forced(&self) -> bool {
        !matches!(self, StopReason::Operator | StopReason::Deactivated)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Operator => write!(f, "stopped by operator"),
            StopReason::AngleLimit { angle, limit } => {
                write!(f, "angle limit reached: {angle:.2} deg (limit {limit} deg)")
            }
            StopReason::TorqueLimit { torque, limit } => {
                write!(f, "torque limit reached: {torque:.2} Nm (limit {limit} Nm)")
            }
            StopReason::Durability { detail } => write!(f, "recording failed: {detail}"),
            StopReason::AngleTrackingLost { missed_reads } => {
                write!(f, "angle tracking lost after {missed_reads} missed reads")
            }
            StopReason::Deactivated => write!(f, "hardware deactivated during run"),
        }
    }
}

/// How and when the last run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopReport {
    /// Why
    pub reason: StopReason,
    /// Index of the sample that triggered the stop, if any
    pub sample_index: Option<u64>,
    /// Run time at the stop, if a sample was involved
    pub elapsed: Option<Duration>,
}

impl StopReport {
    /// Report without sample context.
    pub fn new(reason: StopReason) -> Self {
        Self {
            reason,
            sample_index: None,
            elapsed: None,
        }
    }

    /// Attach the triggering sample.
    pub fn at_sample(mut self, index: u64, elapsed: Duration) -> Self {
        self.sample_index = Some(index);
        self.elapsed = Some(elapsed);
        self
    }
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sample_index {
            Some(index) => write!(f, "{} at sample {index}", self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// Message the operator must see.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// How bad
    pub severity: ErrorSeverity,
    /// What happened
    pub message: String,
    /// When
    pub raised_at: DateTime<Local>,
}

impl Alert {
    /// New alert stamped with the current time.
    pub fn new(severity: ErrorSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            raised_at: Local::now(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.severity,
            self.raised_at.format("%H:%M:%S"),
            self.message
        )
    }
}
