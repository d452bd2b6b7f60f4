//! Convenience re-exports for tests.
//!
//! ```rust,ignore
//! use torsion_test_helpers::prelude::*;
//! ```

pub use crate::must::{must, must_err, must_some, must_with};

pub use crate::{assert_angles_eq, assert_approx_eq, assert_in_range, assert_non_decreasing};

pub use crate::mock::{
    IDENTITY_ANGLE_SCALE, MemorySink, MemorySinkFactory, MotorCommand, MotorProbe, RecordedRuns,
    RecordingMotor, ScriptedAngleSensor, ScriptedChannel, ScriptedTorqueSensor,
};

pub use crate::fixtures::{
    BenchHandles, config_with_period, mock_hardware, mock_machine, mock_sampling_loop,
    motor_position_config, test_config,
};

/// Result type for tests that use `?`.
pub type TestResult = Result<(), Box<dyn std::error::Error>>;
