//! State machine transitions, activation rollback and stop escalation.

use torsion_engine::{MeasurementState, MeasurementStateMachine, RunParameters, StopReason};
use torsion_errors::{ErrorSeverity, InvalidTransitionError, MeasurementError, SensorReadError};
use torsion_test_helpers::prelude::*;

fn active_machine() -> Result<(MeasurementStateMachine, BenchHandles), MeasurementError> {
    let (mut machine, handles) = mock_machine(&test_config());
    machine.activate_hardware()?;
    Ok((machine, handles))
}

mod transitions {
    use super::*;

    #[test]
    fn double_start_is_rejected_without_side_effects() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        machine.start_run(RunParameters::default())?;

        let second = machine.start_run(RunParameters::new(90.0, 5.0, -20.0));
        assert!(matches!(
            second,
            Err(MeasurementError::Transition(InvalidTransitionError {
                from: "Running",
                operation: "start_run"
            }))
        ));
        assert_eq!(machine.state(), MeasurementState::Running);
        assert_eq!(*machine.parameters(), RunParameters::default());
        assert_eq!(handles.motor.move_count(), 1);
        Ok(())
    }

    #[test]
    fn stop_outside_running_is_rejected() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        assert!(matches!(
            machine.stop_run(),
            Err(MeasurementError::Transition(_))
        ));
        assert_eq!(handles.motor.stop_count(), 0);
        assert_eq!(machine.state(), MeasurementState::HardwareActive);
        Ok(())
    }

    #[test]
    fn operator_stop_returns_to_hardware_active() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        machine.start_run(RunParameters::default())?;
        let report = machine.stop_run()?;

        assert_eq!(report.reason, StopReason::Operator);
        assert_eq!(machine.state(), MeasurementState::HardwareActive);
        assert_eq!(machine.last_stop(), Some(&report));
        assert!(!handles.motor.is_moving());
        Ok(())
    }

    #[test]
    fn new_run_allowed_after_forced_stop() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        machine.start_run(RunParameters::default())?;
        machine.force_stop(torsion_engine::StopReport::new(StopReason::TorqueLimit {
            torque: 15.1,
            limit: 15.0,
        }))?;
        assert_eq!(machine.state(), MeasurementState::Stopped);
        assert!(machine.last_stop().is_some());

        machine.start_run(RunParameters::default())?;
        assert_eq!(machine.state(), MeasurementState::Running);
        assert!(machine.last_stop().is_none());
        assert_eq!(handles.motor.move_count(), 2);
        Ok(())
    }

    #[test]
    fn forced_stop_raises_warning_alert() -> TestResult {
        let (mut machine, _handles) = active_machine()?;
        machine.start_run(RunParameters::default())?;
        machine.force_stop(torsion_engine::StopReport::new(StopReason::AngleLimit {
            angle: 360.0,
            limit: 360.0,
        }))?;
        let alert = must_some(machine.alerts().last(), "forced stop should alert");
        assert_eq!(alert.severity, ErrorSeverity::Warning);
        assert!(alert.message.contains("angle limit"));
        Ok(())
    }

    #[test]
    fn deactivate_while_idle_is_noop() -> TestResult {
        let (mut machine, handles) = mock_machine(&test_config());
        machine.deactivate_hardware()?;
        assert_eq!(machine.state(), MeasurementState::Idle);
        assert!(handles.motor.commands().is_empty());
        Ok(())
    }

    #[test]
    fn deactivate_while_running_stops_first() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        machine.start_run(RunParameters::default())?;
        machine.deactivate_hardware()?;

        assert_eq!(machine.state(), MeasurementState::Idle);
        let last = must_some(machine.last_stop(), "implicit stop recorded");
        assert_eq!(last.reason, StopReason::Deactivated);
        assert_eq!(
            handles.motor.commands(),
            vec![
                MotorCommand::Connect,
                MotorCommand::Move(10.0),
                MotorCommand::Stop,
                MotorCommand::Disconnect,
            ]
        );
        assert!(!handles.torque.is_connected());
        assert!(!handles.angle.is_connected());
        Ok(())
    }
}

mod activation {
    use super::*;

    #[test]
    fn failed_device_rolls_back_the_others() -> TestResult {
        let (mut machine, handles) = mock_machine(&test_config());
        handles.angle.fail_connect(true);

        let MeasurementError::Activation(activation) = must_err(machine.activate_hardware())
        else {
            return Err("expected an activation error".into());
        };
        let failed: Vec<&str> = activation.failed_devices().collect();
        assert_eq!(failed, vec!["mock-angle"]);
        assert_eq!(machine.state(), MeasurementState::Idle);
        assert!(!handles.torque.is_connected());
        assert!(!handles.motor.is_connected());
        assert_eq!(
            handles.motor.commands(),
            vec![MotorCommand::Connect, MotorCommand::Disconnect]
        );
        assert_eq!(
            must_some(machine.alerts().last(), "activation alert").severity,
            ErrorSeverity::Error
        );
        Ok(())
    }

    #[test]
    fn every_failed_device_is_reported() -> TestResult {
        let (mut machine, handles) = mock_machine(&test_config());
        handles.torque.fail_connect(true);
        handles.motor.fail_connect(true);

        let MeasurementError::Activation(activation) = must_err(machine.activate_hardware())
        else {
            return Err("expected an activation error".into());
        };
        let failed: Vec<&str> = activation.failed_devices().collect();
        assert_eq!(failed, vec!["mock-torque", "mock-motor"]);
        assert!(!handles.angle.is_connected());
        Ok(())
    }

    #[test]
    fn activation_can_be_retried() -> TestResult {
        let (mut machine, handles) = mock_machine(&test_config());
        handles.motor.fail_connect(true);
        assert!(machine.activate_hardware().is_err());

        handles.motor.fail_connect(false);
        machine.activate_hardware()?;
        assert_eq!(machine.state(), MeasurementState::HardwareActive);
        Ok(())
    }
}

mod stop_escalation {
    use super::*;

    #[test]
    fn stop_succeeds_on_retry() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        machine.start_run(RunParameters::default())?;
        handles.motor.fail_stops(2);

        let report = machine.stop_run()?;
        assert_eq!(report.reason, StopReason::Operator);
        assert_eq!(handles.motor.stop_count(), 3);
        assert_eq!(machine.state(), MeasurementState::HardwareActive);
        Ok(())
    }

    #[test]
    fn exhausted_retries_are_a_hard_fault() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        machine.start_run(RunParameters::default())?;
        handles.motor.fail_stops(3);

        let err = must_err(machine.stop_run());
        assert!(err.is_hard_fault());
        assert!(matches!(
            err,
            MeasurementError::HardFault { attempts: 3, ref device, .. } if device == "mock-motor"
        ));
        assert!(!err.is_recoverable());

        assert_eq!(machine.state(), MeasurementState::Idle);
        assert_eq!(handles.motor.stop_count(), 3);
        assert!(!handles.motor.is_connected());
        assert!(!handles.torque.is_connected());
        assert!(!handles.angle.is_connected());

        let alert = must_some(machine.alerts().last(), "hard fault alert");
        assert_eq!(alert.severity, ErrorSeverity::Critical);
        assert!(alert.message.contains("HARD FAULT"));
        Ok(())
    }

    #[test]
    fn hard_fault_during_forced_stop() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        machine.start_run(RunParameters::default())?;
        handles.motor.fail_stops(10);

        let err = must_err(machine.force_stop(torsion_engine::StopReport::new(
            StopReason::TorqueLimit {
                torque: -15.1,
                limit: 15.0,
            },
        )));
        assert!(err.is_hard_fault());
        assert_eq!(machine.state(), MeasurementState::Idle);

        // The bench can be brought back once the motor answers again.
        handles.motor.fail_stops(0);
        machine.activate_hardware()?;
        assert_eq!(machine.state(), MeasurementState::HardwareActive);
        Ok(())
    }
}

mod start_failures {
    use super::*;

    #[test]
    fn motor_refusing_to_move_leaves_state_unchanged() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        handles.motor.fail_move(true);
        let before = *machine.parameters();

        let err = must_err(machine.start_run(RunParameters::new(90.0, 5.0, 20.0)));
        assert!(matches!(err, MeasurementError::Actuator(_)));
        assert_eq!(machine.state(), MeasurementState::HardwareActive);
        assert_eq!(*machine.parameters(), before);
        assert_eq!(
            handles.motor.commands(),
            vec![
                MotorCommand::Connect,
                MotorCommand::Move(20.0),
                MotorCommand::Stop
            ]
        );
        Ok(())
    }

    #[test]
    fn negative_limit_is_rejected_before_motion() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        let err = must_err(machine.start_run(RunParameters::new(-1.0, 15.0, 10.0)));
        assert!(matches!(err, MeasurementError::Validation(_)));
        assert_eq!(handles.motor.move_count(), 0);
        Ok(())
    }

    #[test]
    fn untrackable_speed_is_rejected_before_motion() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        // 1800 deg/s is 180 deg per 100 ms tick.
        let err = must_err(machine.start_run(RunParameters::new(360.0, 15.0, 1800.0)));
        assert!(matches!(err, MeasurementError::Validation(_)));
        assert_eq!(handles.motor.move_count(), 0);
        assert_eq!(machine.state(), MeasurementState::HardwareActive);
        Ok(())
    }
}

mod maintenance {
    use super::*;

    #[test]
    fn home_requires_ready_hardware() -> TestResult {
        let (mut machine, handles) = mock_machine(&test_config());
        assert!(matches!(machine.home(), Err(MeasurementError::Transition(_))));

        machine.activate_hardware()?;
        machine.start_run(RunParameters::default())?;
        assert!(matches!(machine.home(), Err(MeasurementError::Transition(_))));

        machine.stop_run()?;
        machine.home()?;
        assert!(handles.motor.commands().contains(&MotorCommand::Home));
        Ok(())
    }

    #[test]
    fn failed_home_is_an_actuator_error() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        handles.motor.fail_home(true);
        assert!(matches!(machine.home(), Err(MeasurementError::Actuator(_))));
        assert_eq!(machine.state(), MeasurementState::HardwareActive);
        Ok(())
    }

    #[test]
    fn calibrate_zero_reaches_the_sensor() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        handles.torque.set_fallback(0.25);
        machine.calibrate_zero()?;
        assert_eq!(handles.torque.calibrations(), 1);

        let reading = machine.read_once()?;
        assert_approx_eq!(reading.torque_voltage, 0.0, 1e-12);
        Ok(())
    }

    #[test]
    fn read_once_converts_both_channels() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        handles.torque.set_fallback(3.0);
        handles.angle.set_fallback(90.0);

        let reading = machine.read_once()?;
        assert_approx_eq!(reading.torque, 6.0, 1e-12);
        assert_approx_eq!(reading.raw_angle, 90.0, 1e-9);
        Ok(())
    }

    #[test]
    fn read_once_rejects_non_finite_values() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        handles.torque.push_values(&[f64::NAN]);
        assert!(matches!(
            machine.read_once(),
            Err(MeasurementError::Sensor(SensorReadError::InvalidReading { .. }))
        ));

        handles.angle.push_values(&[f64::INFINITY]);
        assert!(matches!(
            machine.read_once(),
            Err(MeasurementError::Sensor(SensorReadError::InvalidReading { .. }))
        ));
        assert_approx_eq!(machine.read_once()?.torque, 0.0, 1e-12);
        Ok(())
    }

    #[test]
    fn read_once_reports_sensor_failure() -> TestResult {
        let (mut machine, handles) = active_machine()?;
        handles
            .torque
            .push_failure(SensorReadError::timeout("mock-torque", 20));
        assert!(matches!(
            machine.read_once(),
            Err(MeasurementError::Sensor(SensorReadError::Timeout { .. }))
        ));
        assert_eq!(machine.state(), MeasurementState::HardwareActive);
        Ok(())
    }

    #[test]
    fn invalid_parameters_are_rejected() -> TestResult {
        let (mut machine, _handles) = active_machine()?;
        let before = *machine.parameters();
        assert!(matches!(
            machine.set_parameters(RunParameters::new(360.0, f64::NAN, 10.0)),
            Err(MeasurementError::Validation(_))
        ));
        assert_eq!(*machine.parameters(), before);
        Ok(())
    }
}
