//! Sampling loop: tick order, limit stops, fault substitution and recording.

use std::time::Duration;
use torsion_config::BenchConfig;
use torsion_engine::{MeasurementState, RunParameters, SamplingLoop, StopReason, TickOutcome};
use torsion_errors::{MeasurementError, SensorReadError};
use torsion_test_helpers::prelude::*;

const PERIOD: Duration = Duration::from_millis(100);

type Started = (SamplingLoop, BenchHandles, RecordedRuns);

fn started(params: RunParameters) -> Result<Started, MeasurementError> {
    started_with(&test_config(), params)
}

fn started_with(config: &BenchConfig, params: RunParameters) -> Result<Started, MeasurementError> {
    let (mut sampling, handles, runs) = mock_sampling_loop(config);
    sampling.machine_mut().activate_hardware()?;
    sampling.begin_run(params, "specimen-1")?;
    Ok((sampling, handles, runs))
}

/// Tick until the run ends or `max_ticks` pass, advancing the clock one
/// period after every tick.
fn run_to_end(
    sampling: &mut SamplingLoop,
    handles: &BenchHandles,
    max_ticks: usize,
) -> Option<TickOutcome> {
    for _ in 0..max_ticks {
        let outcome = sampling.tick();
        handles.advance(PERIOD);
        if outcome.ended_run() {
            return Some(outcome);
        }
    }
    None
}

mod limits {
    use super::*;

    #[test]
    fn angle_limit_stops_before_overrun() -> TestResult {
        let (mut sampling, handles, runs) = started(RunParameters::new(360.0, 15.0, 10.0))?;
        // 10 deg/s at 100 ms is one degree per tick.
        handles.angle.set_ramp(0.0, 1.0);

        let outcome = must_some(run_to_end(&mut sampling, &handles, 1_000), "run should stop");
        let TickOutcome::Stopped { sample, report } = outcome else {
            return Err(format!("expected a stop, got {outcome:?}").into());
        };
        let sample = must_some(sample, "stopping sample");
        assert_eq!(sample.index, 360);
        assert_approx_eq!(sample.angle, 360.0, 1e-6);
        assert!(matches!(report.reason, StopReason::AngleLimit { .. }));
        assert_eq!(report.sample_index, Some(360));

        assert_eq!(sampling.state(), MeasurementState::Stopped);
        assert_eq!(handles.motor.move_count(), 1);
        assert_eq!(handles.motor.stop_count(), 1);
        assert!(!handles.motor.is_moving());

        let angles = runs.angles();
        assert_eq!(angles.len(), 361);
        assert_non_decreasing!(&angles);
        assert!(angles.iter().rev().skip(1).all(|a| *a < 360.0));
        Ok(())
    }

    #[test]
    fn nothing_recorded_after_stop() -> TestResult {
        let (mut sampling, handles, runs) = started(RunParameters::new(5.0, 15.0, 10.0))?;
        handles.angle.set_ramp(0.0, 1.0);
        assert!(run_to_end(&mut sampling, &handles, 100).is_some());
        let recorded = runs.samples().len();

        for _ in 0..10 {
            assert!(matches!(sampling.tick(), TickOutcome::Idle));
            handles.advance(PERIOD);
        }
        assert_eq!(runs.samples().len(), recorded);
        assert_eq!(handles.motor.move_count(), 1);
        assert_eq!(runs.closed(), 1);
        Ok(())
    }

    #[test]
    fn positive_torque_over_limit_stops() -> TestResult {
        let (mut sampling, handles, runs) = started(RunParameters::default())?;
        handles.torque.push_values(&[1.0, 2.0]);
        // 7.55 V at 2 Nm/V is 15.1 Nm.
        handles.torque.set_fallback(7.55);

        let outcome = must_some(run_to_end(&mut sampling, &handles, 10), "run should stop");
        let TickOutcome::Stopped { report, .. } = outcome else {
            return Err(format!("expected a stop, got {outcome:?}").into());
        };
        let StopReason::TorqueLimit { torque, limit } = report.reason else {
            return Err(format!("expected torque limit, got {:?}", report.reason).into());
        };
        assert_approx_eq!(torque, 15.1, 1e-9);
        assert_approx_eq!(limit, 15.0, 1e-12);
        assert_eq!(report.sample_index, Some(2));
        assert_eq!(runs.samples().len(), 3);
        assert_eq!(sampling.state(), MeasurementState::Stopped);
        Ok(())
    }

    #[test]
    fn negative_torque_over_limit_stops() -> TestResult {
        let (mut sampling, handles, _runs) = started(RunParameters::default())?;
        handles.torque.set_fallback(-7.55);

        let outcome = must_some(run_to_end(&mut sampling, &handles, 10), "run should stop");
        let TickOutcome::Stopped { sample, report } = outcome else {
            return Err(format!("expected a stop, got {outcome:?}").into());
        };
        assert!(matches!(report.reason, StopReason::TorqueLimit { torque, .. } if torque < -15.0));
        assert_eq!(must_some(sample, "stopping sample").index, 0);
        assert_eq!(handles.motor.stop_count(), 1);
        Ok(())
    }

    #[test]
    fn limit_is_inclusive() -> TestResult {
        let (mut sampling, handles, _runs) = started(RunParameters::default())?;
        handles.torque.push_values(&[7.49]);
        handles.torque.set_fallback(7.5);

        assert!(matches!(sampling.tick(), TickOutcome::Sampled { .. }));
        handles.advance(PERIOD);
        assert!(matches!(sampling.tick(), TickOutcome::Stopped { .. }));
        Ok(())
    }

    #[test]
    fn failed_stop_in_tick_is_a_hard_fault() -> TestResult {
        let (mut sampling, handles, runs) = started(RunParameters::default())?;
        handles.torque.set_fallback(9.0);
        handles.motor.fail_stops(3);

        let outcome = sampling.tick();
        let TickOutcome::Faulted { error } = outcome else {
            return Err(format!("expected a fault, got {outcome:?}").into());
        };
        assert!(error.is_hard_fault());
        assert_eq!(sampling.state(), MeasurementState::Idle);
        assert_eq!(runs.closed(), 1);
        assert!(!handles.motor.is_connected());
        Ok(())
    }
}

mod acquisition {
    use super::*;

    /// Ten turns of travel, so angle tests never trip the limit.
    fn wide() -> RunParameters {
        RunParameters::new(3600.0, 15.0, 10.0)
    }

    #[test]
    fn wrap_is_unwrapped_across_ticks() -> TestResult {
        let (mut sampling, handles, runs) = started(wide())?;
        handles.angle.push_values(&[350.0, 358.0, 5.0, 12.0]);

        for _ in 0..4 {
            assert!(matches!(sampling.tick(), TickOutcome::Sampled { .. }));
            handles.advance(PERIOD);
        }
        assert_angles_eq!(&runs.angles(), &[350.0, 358.0, 365.0, 372.0], 1e-6);
        Ok(())
    }

    #[test]
    fn elapsed_follows_the_clock() -> TestResult {
        let (mut sampling, handles, runs) = started(wide())?;
        for _ in 0..5 {
            let _ = sampling.tick();
            handles.advance(PERIOD);
        }
        let elapsed: Vec<Duration> = runs.samples().iter().map(|s| s.elapsed).collect();
        let expected: Vec<Duration> = (0..5u32).map(|i| PERIOD * i).collect();
        assert_eq!(elapsed, expected);
        assert_eq!(sampling.samples_taken(), 5);
        Ok(())
    }

    #[test]
    fn torque_is_voltage_times_scale() -> TestResult {
        let (mut sampling, handles, runs) = started(wide())?;
        handles.torque.push_values(&[-1.25, 0.5]);
        let _ = sampling.tick();
        let _ = sampling.tick();

        let samples = runs.samples();
        let torques: Vec<f64> = samples.iter().map(|s| s.torque).collect();
        assert_angles_eq!(&torques, &[-2.5, 1.0], 1e-12);
        let volts: Vec<f64> = samples.iter().map(|s| s.torque_voltage).collect();
        assert_angles_eq!(&volts, &[-1.25, 0.5], 1e-12);
        Ok(())
    }

    #[test]
    fn torque_failure_substitutes_zero_volts() -> TestResult {
        let (mut sampling, handles, _runs) = started(wide())?;
        handles.torque.set_fallback(3.0);
        handles
            .torque
            .push_failure(SensorReadError::disconnected("mock-torque"));

        let outcome = sampling.tick();
        let TickOutcome::Sampled { sample, sensor_faults } = outcome else {
            return Err(format!("expected a sample, got {outcome:?}").into());
        };
        assert_eq!(sensor_faults, 1);
        assert_approx_eq!(sample.torque_voltage, 0.0, 1e-12);
        assert_approx_eq!(sample.torque, 0.0, 1e-12);

        let outcome = sampling.tick();
        assert!(matches!(outcome, TickOutcome::Sampled { sensor_faults: 0, .. }));
        assert_approx_eq!(must_some(outcome.sample(), "sample").torque, 6.0, 1e-12);
        assert_eq!(sampling.state(), MeasurementState::Running);
        Ok(())
    }

    #[test]
    fn angle_failure_holds_last_angle() -> TestResult {
        let (mut sampling, handles, runs) = started(wide())?;
        handles.angle.push_values(&[350.0, 10.0]);
        handles
            .angle
            .push_failure(SensorReadError::timeout("mock-angle", 20));
        handles.angle.push_values(&[20.0]);

        let mut faults = Vec::new();
        for _ in 0..4 {
            if let TickOutcome::Sampled { sensor_faults, .. } = sampling.tick() {
                faults.push(sensor_faults);
            }
            handles.advance(PERIOD);
        }
        assert_eq!(faults, vec![0, 0, 1, 0]);
        assert_angles_eq!(&runs.angles(), &[350.0, 370.0, 370.0, 380.0], 1e-6);
        let signals: Vec<f64> = runs.samples().iter().map(|s| s.angle_signal).collect();
        assert_angles_eq!(&signals, &[350.0, 10.0, 10.0, 20.0], 1e-6);
        Ok(())
    }

    #[test]
    fn angle_failure_on_first_tick_holds_zero() -> TestResult {
        let (mut sampling, handles, runs) = started(wide())?;
        handles
            .angle
            .push_failure(SensorReadError::disconnected("mock-angle"));
        handles.angle.push_values(&[45.0]);

        let _ = sampling.tick();
        let _ = sampling.tick();
        assert_angles_eq!(&runs.angles(), &[0.0, 45.0], 1e-6);
        Ok(())
    }

    #[test]
    fn non_finite_torque_is_a_sensor_fault() -> TestResult {
        let (mut sampling, handles, runs) = started(RunParameters::default())?;
        handles.torque.push_values(&[f64::NAN, f64::NEG_INFINITY]);
        handles.torque.set_fallback(7.55);

        for _ in 0..2 {
            let outcome = sampling.tick();
            let TickOutcome::Sampled { sample, sensor_faults } = outcome else {
                return Err(format!("expected a sample, got {outcome:?}").into());
            };
            assert_eq!(sensor_faults, 1);
            assert_approx_eq!(sample.torque_voltage, 0.0, 1e-12);
            assert_approx_eq!(sample.torque, 0.0, 1e-12);
            handles.advance(PERIOD);
        }
        assert!(runs.samples().iter().all(|s| s.torque.is_finite()));

        // The limit still sees the first real reading.
        let outcome = sampling.tick();
        assert!(matches!(
            outcome,
            TickOutcome::Stopped { ref report, .. } if matches!(report.reason, StopReason::TorqueLimit { .. })
        ));
        Ok(())
    }

    #[test]
    fn non_finite_angle_holds_last_angle() -> TestResult {
        let (mut sampling, handles, runs) = started(wide())?;
        handles.angle.push_values(&[350.0, 358.0, f64::NAN, 5.0, 12.0]);

        let mut faults = Vec::new();
        for _ in 0..5 {
            if let TickOutcome::Sampled { sensor_faults, .. } = sampling.tick() {
                faults.push(sensor_faults);
            }
            handles.advance(PERIOD);
        }
        assert_eq!(faults, vec![0, 0, 1, 0, 0]);
        assert_angles_eq!(&runs.angles(), &[350.0, 358.0, 358.0, 365.0, 372.0], 1e-6);
        assert_eq!(sampling.machine().unwrapper().turn_count(), 1);
        assert_eq!(sampling.state(), MeasurementState::Running);
        Ok(())
    }

    #[test]
    fn slow_torque_read_counts_as_failure() -> TestResult {
        let (mut sampling, handles, _runs) = started(wide())?;
        handles.torque.set_fallback(2.0);
        // Read timeout is 20 ms.
        handles
            .torque
            .set_read_delay(handles.clock.clone(), Duration::from_millis(30));

        let outcome = sampling.tick();
        assert!(matches!(outcome, TickOutcome::Sampled { sensor_faults: 1, .. }));
        assert_approx_eq!(must_some(outcome.sample(), "sample").torque_voltage, 0.0, 1e-12);

        handles
            .torque
            .set_read_delay(handles.clock.clone(), Duration::from_millis(20));
        let outcome = sampling.tick();
        assert!(matches!(outcome, TickOutcome::Sampled { sensor_faults: 0, .. }));
        assert_approx_eq!(must_some(outcome.sample(), "sample").torque_voltage, 2.0, 1e-12);
        Ok(())
    }

    #[test]
    fn motor_position_as_angle_source() -> TestResult {
        let config = motor_position_config();
        let (mut sampling, handles, runs) =
            started_with(&config, RunParameters::new(360.0, 15.0, 10.0))?;
        handles.motor.set_position_step(1.0);

        let outcome = must_some(run_to_end(&mut sampling, &handles, 1_000), "run should stop");
        let TickOutcome::Stopped { sample, report } = outcome else {
            return Err(format!("expected a stop, got {outcome:?}").into());
        };
        assert!(matches!(report.reason, StopReason::AngleLimit { .. }));
        assert_eq!(must_some(sample, "stopping sample").index, 360);
        assert_eq!(handles.angle.reads(), 0);
        assert_eq!(runs.samples().len(), 361);
        Ok(())
    }

    #[test]
    fn non_finite_motor_position_holds_last_position() -> TestResult {
        let config = motor_position_config();
        let (mut sampling, handles, runs) = started_with(&config, wide())?;
        handles.motor.set_position(12.0);

        let _ = sampling.tick();
        handles.motor.set_position(f64::NAN);
        let outcome = sampling.tick();
        assert!(matches!(outcome, TickOutcome::Sampled { sensor_faults: 1, .. }));
        assert_angles_eq!(&runs.angles(), &[12.0, 12.0], 1e-12);
        Ok(())
    }

    #[test]
    fn motor_position_failure_holds_last_position() -> TestResult {
        let config = motor_position_config();
        let (mut sampling, handles, runs) = started_with(&config, wide())?;
        handles.motor.set_position(-4.0);
        handles.motor.set_position_step(-2.0);

        let _ = sampling.tick();
        handles.motor.fail_position_reads(1);
        let _ = sampling.tick();
        let _ = sampling.tick();
        assert_angles_eq!(&runs.angles(), &[-4.0, -4.0, -6.0], 1e-12);
        Ok(())
    }

    #[test]
    fn unwrapper_is_reset_for_each_run() -> TestResult {
        let (mut sampling, handles, runs) = started(wide())?;
        handles.angle.push_values(&[300.0, 10.0]);
        let _ = sampling.tick();
        let _ = sampling.tick();
        sampling.end_run()?;

        handles.angle.push_values(&[5.0]);
        sampling.begin_run(wide(), "specimen-2")?;
        let _ = sampling.tick();
        assert_angles_eq!(&runs.angles(), &[300.0, 370.0, 5.0], 1e-6);
        assert_eq!(runs.opened(), 2);
        Ok(())
    }
}

mod tracking {
    use super::*;

    #[test]
    fn missed_read_at_high_speed_stops_the_run() -> TestResult {
        // 1000 deg/s at 100 ms is 100 deg per tick; one miss makes the next
        // read span 200 deg, past the 180 deg threshold.
        let (mut sampling, handles, runs) = started(RunParameters::new(3600.0, 15.0, 1000.0))?;
        handles.angle.push_values(&[0.0, 100.0, 200.0, 300.0]);
        handles
            .angle
            .push_failure(SensorReadError::disconnected("mock-angle"));
        handles.angle.push_values(&[140.0, 240.0]);

        let outcome = must_some(run_to_end(&mut sampling, &handles, 10), "run should stop");
        let TickOutcome::Stopped { sample, report } = outcome else {
            return Err(format!("expected a stop, got {outcome:?}").into());
        };
        assert_eq!(report.reason, StopReason::AngleTrackingLost { missed_reads: 1 });
        assert_eq!(must_some(sample, "held sample").index, 4);
        assert_angles_eq!(&runs.angles(), &[0.0, 100.0, 200.0, 300.0, 300.0], 1e-6);
        assert_eq!(sampling.state(), MeasurementState::Stopped);
        assert_eq!(handles.motor.stop_count(), 1);
        assert!(report.reason.is_forced());
        Ok(())
    }

    #[test]
    fn misses_are_tolerated_while_the_span_stays_below_threshold() -> TestResult {
        // 500 deg/s is 50 deg per tick: two misses span 150 deg, three span 200.
        let (mut sampling, handles, runs) = started(RunParameters::new(3600.0, 15.0, 500.0))?;
        handles.angle.push_values(&[0.0, 50.0]);
        for _ in 0..3 {
            handles
                .angle
                .push_failure(SensorReadError::timeout("mock-angle", 20));
        }

        let outcome = must_some(run_to_end(&mut sampling, &handles, 10), "run should stop");
        let TickOutcome::Stopped { report, .. } = outcome else {
            return Err(format!("expected a stop, got {outcome:?}").into());
        };
        assert_eq!(report.reason, StopReason::AngleTrackingLost { missed_reads: 3 });
        assert_eq!(report.sample_index, Some(4));
        assert_eq!(runs.samples().len(), 5);
        Ok(())
    }

    #[test]
    fn a_good_read_clears_the_miss_count() -> TestResult {
        let (mut sampling, handles, runs) = started(RunParameters::new(3600.0, 15.0, 500.0))?;
        handles.angle.push_values(&[0.0]);
        for _ in 0..2 {
            handles
                .angle
                .push_failure(SensorReadError::disconnected("mock-angle"));
        }
        handles.angle.push_values(&[150.0]);
        for _ in 0..2 {
            handles
                .angle
                .push_failure(SensorReadError::disconnected("mock-angle"));
        }
        handles.angle.push_values(&[300.0]);

        for _ in 0..7 {
            assert!(matches!(sampling.tick(), TickOutcome::Sampled { .. }));
            handles.advance(PERIOD);
        }
        assert_angles_eq!(
            &runs.angles(),
            &[0.0, 0.0, 0.0, 150.0, 150.0, 150.0, 300.0],
            1e-6
        );
        assert_eq!(sampling.state(), MeasurementState::Running);
        Ok(())
    }

    #[test]
    fn motor_position_source_is_not_limited_by_misses() -> TestResult {
        let config = motor_position_config();
        let (mut sampling, handles, _runs) =
            started_with(&config, RunParameters::new(36_000.0, 15.0, 1000.0))?;
        handles.motor.set_position_step(100.0);
        handles.motor.fail_position_reads(3);

        for _ in 0..4 {
            assert!(matches!(sampling.tick(), TickOutcome::Sampled { .. }));
            handles.advance(PERIOD);
        }
        assert_eq!(sampling.state(), MeasurementState::Running);
        Ok(())
    }
}

mod recording {
    use super::*;

    #[test]
    fn sink_failure_forces_stop() -> TestResult {
        let (mut sampling, handles, runs) = started(RunParameters::default())?;
        runs.fail_after(3);

        let outcome = must_some(run_to_end(&mut sampling, &handles, 10), "run should stop");
        let TickOutcome::Stopped { sample, report } = outcome else {
            return Err(format!("expected a stop, got {outcome:?}").into());
        };
        assert!(matches!(report.reason, StopReason::Durability { .. }));
        assert_eq!(must_some(sample, "unsaved sample").index, 3);
        assert_eq!(runs.samples().len(), 3);
        assert_eq!(sampling.state(), MeasurementState::Stopped);
        assert_eq!(handles.motor.stop_count(), 1);
        Ok(())
    }

    #[test]
    fn sink_is_opened_before_motion() -> TestResult {
        let (mut sampling, handles, runs) = mock_sampling_loop(&test_config());
        sampling.machine_mut().activate_hardware()?;
        runs.fail_open(true);

        let err = must_err(sampling.begin_run(RunParameters::default(), "specimen-1"));
        assert!(matches!(err, MeasurementError::Durability(_)));
        assert_eq!(handles.motor.move_count(), 0);
        assert_eq!(sampling.state(), MeasurementState::HardwareActive);
        Ok(())
    }

    #[test]
    fn header_describes_the_run() -> TestResult {
        let params = RunParameters::new(720.0, 12.0, -30.0);
        let (_sampling, _handles, runs) = started(params)?;

        let headers = runs.headers();
        let header = must_some(headers.first(), "header written");
        assert_eq!(header.sample_name, "specimen-1");
        assert_eq!(header.parameters, params);
        assert_eq!(header.period, PERIOD);
        assert_approx_eq!(header.torque_scale, 2.0, 1e-12);
        Ok(())
    }

    #[test]
    fn rejected_start_opens_no_sink() -> TestResult {
        let (mut sampling, _handles, runs) = started(RunParameters::default())?;
        assert!(matches!(
            sampling.begin_run(RunParameters::default(), "again"),
            Err(MeasurementError::Transition(_))
        ));
        assert_eq!(runs.opened(), 1);
        assert_eq!(sampling.state(), MeasurementState::Running);
        Ok(())
    }

    #[test]
    fn motor_refusal_discards_the_new_sink() -> TestResult {
        let (mut sampling, handles, runs) = mock_sampling_loop(&test_config());
        sampling.machine_mut().activate_hardware()?;
        handles.motor.fail_move(true);

        assert!(sampling.begin_run(RunParameters::default(), "s").is_err());
        assert_eq!(runs.opened(), 1);
        assert_eq!(runs.discarded(), 1);
        assert_eq!(runs.closed(), 1);
        assert!(matches!(sampling.tick(), TickOutcome::Idle));
        Ok(())
    }

    #[test]
    fn motor_refusal_keeps_the_previous_run_state() -> TestResult {
        let (mut sampling, handles, _runs) = started(RunParameters::new(3600.0, 15.0, 10.0))?;
        handles.angle.push_values(&[300.0, 10.0]);
        let _ = sampling.tick();
        let _ = sampling.tick();
        sampling.end_run()?;
        let before = *sampling.machine().parameters();

        handles.motor.fail_move(true);
        let err = must_err(sampling.begin_run(RunParameters::new(90.0, 5.0, -20.0), "again"));
        assert!(matches!(err, MeasurementError::Actuator(_)));
        assert_eq!(*sampling.machine().parameters(), before);
        assert_eq!(sampling.machine().unwrapper().turn_count(), 1);
        assert_approx_eq!(sampling.machine().unwrapper().continuous_angle(), 370.0, 1e-6);
        Ok(())
    }

    #[test]
    fn operator_stop_closes_the_sink() -> TestResult {
        let (mut sampling, handles, runs) = started(RunParameters::default())?;
        let _ = sampling.tick();
        handles.advance(PERIOD);

        let report = sampling.end_run()?;
        assert_eq!(report.reason, StopReason::Operator);
        assert_eq!(runs.closed(), 1);
        assert_eq!(sampling.state(), MeasurementState::HardwareActive);
        assert!(sampling.run_elapsed().is_none());
        assert!(matches!(sampling.tick(), TickOutcome::Idle));
        Ok(())
    }

    #[test]
    fn deactivate_during_run_closes_the_sink() -> TestResult {
        let (mut sampling, handles, runs) = started(RunParameters::default())?;
        let _ = sampling.tick();
        sampling.deactivate()?;

        assert_eq!(runs.closed(), 1);
        assert_eq!(sampling.state(), MeasurementState::Idle);
        assert!(!handles.motor.is_connected());
        Ok(())
    }
}
