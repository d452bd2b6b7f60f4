//! Configurations and mock benches for common scenarios.

use std::sync::Arc;
use std::time::Duration;
use torsion_config::{AngleSource, BenchConfig, SamplingConfig};
use torsion_engine::{MeasurementStateMachine, SamplingLoop};
use torsion_hardware::{BenchHardware, ManualClock, SharedClock};

use crate::mock::{
    MemorySinkFactory, MotorProbe, RecordedRuns, RecordingMotor, ScriptedAngleSensor,
    ScriptedChannel, ScriptedTorqueSensor,
};

/// Demo configuration with no retry delay and no simulated noise.
///
/// Defaults otherwise: 100 ms period, 20 ms read timeout, 180° wrap
/// threshold, 2 Nm/V, limits 360° / 15 Nm at 10 deg/s, three stop attempts.
pub fn test_config() -> BenchConfig {
    let mut config = BenchConfig::demo();
    config.safety.stop_retry_delay_ms = 0;
    config.simulation.noise_nm = 0.0;
    config
}

/// [`test_config`] with the motor as angle source.
pub fn motor_position_config() -> BenchConfig {
    let config = test_config();
    let sampling = config.sampling.clone().with_angle_source(AngleSource::MotorPosition);
    config.with_sampling(sampling)
}

/// [`test_config`] with a different tick period.
pub fn config_with_period(period_ms: u64) -> BenchConfig {
    let config = test_config();
    let sampling = SamplingConfig {
        read_timeout_ms: period_ms / 5,
        ..config.sampling.clone().with_period_ms(period_ms)
    };
    config.with_sampling(sampling)
}

/// Handles to every mock device of a bench.
#[derive(Debug, Clone)]
pub struct BenchHandles {
    /// Torque channel script
    pub torque: ScriptedChannel,
    /// Angle channel script
    pub angle: ScriptedChannel,
    /// Motor command log and failure script
    pub motor: MotorProbe,
    /// The clock the bench and loop run on
    pub clock: Arc<ManualClock>,
    /// Same clock as a [`SharedClock`]
    pub shared_clock: SharedClock,
}

impl BenchHandles {
    /// Advance the clock by one tick period.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

/// Build mock hardware plus the handles to script it.
pub fn mock_hardware() -> (BenchHardware, BenchHandles) {
    let (torque, torque_channel) = ScriptedTorqueSensor::new();
    let (angle, angle_channel) = ScriptedAngleSensor::new();
    let (motor, motor_probe) = RecordingMotor::new();
    let (clock, shared_clock) = ManualClock::shared();

    let hardware = BenchHardware::new(Box::new(torque), Box::new(angle), Box::new(motor));
    let handles = BenchHandles {
        torque: torque_channel,
        angle: angle_channel,
        motor: motor_probe,
        clock,
        shared_clock,
    };
    (hardware, handles)
}

/// State machine over mock hardware.
pub fn mock_machine(config: &BenchConfig) -> (MeasurementStateMachine, BenchHandles) {
    let (hardware, handles) = mock_hardware();
    (MeasurementStateMachine::new(hardware, config), handles)
}

/// Sampling loop over mock hardware recording into memory.
pub fn mock_sampling_loop(config: &BenchConfig) -> (SamplingLoop, BenchHandles, RecordedRuns) {
    let (machine, handles) = mock_machine(config);
    let (factory, runs) = MemorySinkFactory::new();
    let sampling = SamplingLoop::new(
        machine,
        Box::new(factory),
        handles.shared_clock.clone(),
        &config.sampling,
    );
    (sampling, handles, runs)
}
