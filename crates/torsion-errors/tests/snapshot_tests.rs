//! Snapshot tests for operator-facing error messages.
//!
//! These strings end up in the CLI output and the alert log, so they are
//! pinned here.

use torsion_errors::prelude::*;

mod message_snapshots {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn test_invalid_transition() {
        assert_snapshot!(
            InvalidTransitionError::new("Running", "start_run").to_string(),
            @"Invalid transition: start_run is not allowed while Running"
        );
    }

    #[test]
    fn test_sensor_timeout() {
        assert_snapshot!(
            SensorReadError::timeout("torque", 20).to_string(),
            @"Sensor torque read timed out after 20ms"
        );
    }

    #[test]
    fn test_actuator_rejected() {
        assert_snapshot!(
            ActuatorCommandError::rejected("motor", "stop", "drive fault").to_string(),
            @"Actuator motor rejected stop: drive fault"
        );
    }

    #[test]
    fn test_activation_failure() {
        let err = ActivationError::new(vec![DeviceFailure::new(
            "motor",
            DeviceError::connection_failed("motor", "no response"),
        )]);
        assert_snapshot!(
            err.to_string(),
            @"Hardware activation failed for 1 device(s): motor (Failed to connect to motor: no response)"
        );
    }

    #[test]
    fn test_hard_fault() {
        let err = MeasurementError::hard_fault("motor", 3, ActuatorCommandError::not_connected("motor"));
        assert_snapshot!(
            err.to_string(),
            @"HARD FAULT: motor did not stop after 3 attempts: Actuator motor is not connected"
        );
    }
}
