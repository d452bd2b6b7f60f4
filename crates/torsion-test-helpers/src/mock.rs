//! Mock devices and sinks.
//!
//! Each mock is split into the device (moved into [`BenchHardware`]) and a
//! cloneable handle that tests keep to script behaviour and inspect what
//! happened. Both share one `Arc<Mutex<_>>`.
//!
//! [`BenchHardware`]: torsion_hardware::BenchHardware

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use torsion_engine::{DataSink, RunHeader, Sample, SinkFactory};
use torsion_errors::{ActuatorCommandError, DeviceError, DurabilityError, SensorReadError};
use torsion_hardware::scale::normalize_angle;
use torsion_hardware::{
    AngleSensor, BenchDevice, LinearScale, ManualClock, MotorActuator, TorqueSensor,
};

/// Angle scale where one volt is one degree.
pub const IDENTITY_ANGLE_SCALE: LinearScale = LinearScale::new(0.0, 360.0, 0.0, 360.0);

#[derive(Debug, Default)]
struct ChannelState {
    script: VecDeque<Result<f64, SensorReadError>>,
    fallback: f64,
    ramp_step: f64,
    wraps: bool,
    offset: f64,
    delay: Option<(Arc<ManualClock>, Duration)>,
    reads: u64,
    calibrations: u32,
    connected: bool,
    fail_connect: bool,
}

impl ChannelState {
    fn next_reading(&mut self, device: &str) -> Result<f64, SensorReadError> {
        if !self.connected {
            return Err(SensorReadError::disconnected(device));
        }
        self.reads = self.reads.saturating_add(1);
        if let Some((clock, by)) = &self.delay {
            clock.advance(*by);
        }
        if let Some(step) = self.script.pop_front() {
            return step.map(|value| value + self.offset);
        }
        let value = self.fallback;
        let next = value + self.ramp_step;
        self.fallback = if self.wraps { normalize_angle(next) } else { next };
        Ok(value + self.offset)
    }
}

/// Handle to a scripted sensor channel.
///
/// Reads first drain the script, then return the fallback value. A non-zero
/// ramp step is added to the fallback after every fallback read.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl ScriptedChannel {
    fn new(wraps: bool) -> Self {
        let channel = Self::default();
        channel.state.lock().wraps = wraps;
        channel
    }

    /// Queue values returned by the next reads, in order.
    pub fn push_values(&self, values: &[f64]) {
        let mut state = self.state.lock();
        state.script.extend(values.iter().copied().map(Ok));
    }

    /// Queue one failed read.
    pub fn push_failure(&self, error: SensorReadError) {
        self.state.lock().script.push_back(Err(error));
    }

    /// Value returned once the script is empty.
    pub fn set_fallback(&self, value: f64) {
        self.state.lock().fallback = value;
    }

    /// Add `step` to the fallback after every fallback read.
    pub fn set_ramp(&self, start: f64, step: f64) {
        let mut state = self.state.lock();
        state.fallback = start;
        state.ramp_step = step;
    }

    /// Advance `clock` by `by` inside every read, simulating a slow device.
    pub fn set_read_delay(&self, clock: Arc<ManualClock>, by: Duration) {
        self.state.lock().delay = Some((clock, by));
    }

    /// Stop simulating slow reads.
    pub fn clear_read_delay(&self) {
        self.state.lock().delay = None;
    }

    /// Make the next `connect` fail.
    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    /// Reads attempted while connected.
    pub fn reads(&self) -> u64 {
        self.state.lock().reads
    }

    /// Zero calibrations performed.
    pub fn calibrations(&self) -> u32 {
        self.state.lock().calibrations
    }

    /// Whether the device is open.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn connect(&self, device: &str) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if state.fail_connect {
            return Err(DeviceError::connection_failed(device, "scripted failure"));
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&self) {
        self.state.lock().connected = false;
    }
}

/// Torque sensor that replays a script of voltages.
#[derive(Debug)]
pub struct ScriptedTorqueSensor {
    name: String,
    channel: ScriptedChannel,
}

impl ScriptedTorqueSensor {
    /// New sensor reading 0 V, plus its handle.
    pub fn new() -> (Self, ScriptedChannel) {
        let channel = ScriptedChannel::new(false);
        let sensor = Self {
            name: "mock-torque".to_string(),
            channel: channel.clone(),
        };
        (sensor, channel)
    }
}

impl BenchDevice for ScriptedTorqueSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        self.channel.connect(&self.name)
    }

    fn disconnect(&mut self) {
        self.channel.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }
}

impl TorqueSensor for ScriptedTorqueSensor {
    fn read_voltage(&mut self) -> Result<f64, SensorReadError> {
        self.channel.state.lock().next_reading(&self.name)
    }

    /// Takes the current fallback value as the new zero.
    fn calibrate_zero(&mut self) -> Result<(), SensorReadError> {
        let mut state = self.channel.state.lock();
        if !state.connected {
            return Err(SensorReadError::disconnected(&self.name));
        }
        state.offset = -state.fallback;
        state.calibrations = state.calibrations.saturating_add(1);
        Ok(())
    }
}

/// Angle sensor that replays a script of raw angles.
///
/// Uses [`IDENTITY_ANGLE_SCALE`], so scripted voltages are degrees. A ramp
/// wraps at 360°.
#[derive(Debug)]
pub struct ScriptedAngleSensor {
    name: String,
    channel: ScriptedChannel,
    scale: LinearScale,
}

impl ScriptedAngleSensor {
    /// New sensor reading 0°, plus its handle.
    pub fn new() -> (Self, ScriptedChannel) {
        let channel = ScriptedChannel::new(true);
        let sensor = Self {
            name: "mock-angle".to_string(),
            channel: channel.clone(),
            scale: IDENTITY_ANGLE_SCALE,
        };
        (sensor, channel)
    }
}

impl BenchDevice for ScriptedAngleSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        self.channel.connect(&self.name)
    }

    fn disconnect(&mut self) {
        self.channel.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }
}

impl AngleSensor for ScriptedAngleSensor {
    fn read_voltage(&mut self) -> Result<f64, SensorReadError> {
        self.channel.state.lock().next_reading(&self.name)
    }

    fn scale(&self) -> &LinearScale {
        &self.scale
    }
}

/// A command seen by [`RecordingMotor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorCommand {
    /// `connect`
    Connect,
    /// `disconnect`
    Disconnect,
    /// `home`
    Home,
    /// `move_continuous` with the requested velocity
    Move(f64),
    /// `stop`, whether or not it was confirmed
    Stop,
    /// `get_position`
    GetPosition,
}

#[derive(Debug, Default)]
struct MotorState {
    log: Vec<MotorCommand>,
    connected: bool,
    moving: bool,
    position: f64,
    position_step: f64,
    stop_failures_remaining: u32,
    position_failures_remaining: u32,
    fail_move: bool,
    fail_home: bool,
    fail_connect: bool,
}

/// Handle to a [`RecordingMotor`].
#[derive(Debug, Clone, Default)]
pub struct MotorProbe {
    state: Arc<Mutex<MotorState>>,
}

impl MotorProbe {
    /// Every command received, in order.
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.state.lock().log.clone()
    }

    /// Number of `move_continuous` commands received.
    pub fn move_count(&self) -> usize {
        self.count(|cmd| matches!(cmd, MotorCommand::Move(_)))
    }

    /// Number of `stop` commands received.
    pub fn stop_count(&self) -> usize {
        self.count(|cmd| matches!(cmd, MotorCommand::Stop))
    }

    fn count(&self, pred: impl Fn(&MotorCommand) -> bool) -> usize {
        self.state.lock().log.iter().filter(|cmd| pred(cmd)).count()
    }

    /// Whether the motor believes it is moving.
    pub fn is_moving(&self) -> bool {
        self.state.lock().moving
    }

    /// Whether the motor is connected.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Reject the next `n` stop commands.
    pub fn fail_stops(&self, n: u32) {
        self.state.lock().stop_failures_remaining = n;
    }

    /// Fail the next `n` position reads.
    pub fn fail_position_reads(&self, n: u32) {
        self.state.lock().position_failures_remaining = n;
    }

    /// Reject every `move_continuous`.
    pub fn fail_move(&self, fail: bool) {
        self.state.lock().fail_move = fail;
    }

    /// Reject every `home`.
    pub fn fail_home(&self, fail: bool) {
        self.state.lock().fail_home = fail;
    }

    /// Fail `connect`.
    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    /// Position reported by the next `get_position`.
    pub fn set_position(&self, degrees: f64) {
        self.state.lock().position = degrees;
    }

    /// Degrees added to the position after each `get_position` while moving.
    pub fn set_position_step(&self, degrees: f64) {
        self.state.lock().position_step = degrees;
    }
}

/// Motor that records every command and obeys a failure script.
#[derive(Debug)]
pub struct RecordingMotor {
    name: String,
    probe: MotorProbe,
}

impl RecordingMotor {
    /// New motor plus its probe.
    pub fn new() -> (Self, MotorProbe) {
        let probe = MotorProbe::default();
        let motor = Self {
            name: "mock-motor".to_string(),
            probe: probe.clone(),
        };
        (motor, probe)
    }

    fn record(&self, command: MotorCommand) -> parking_lot::MutexGuard<'_, MotorState> {
        let mut state = self.probe.state.lock();
        state.log.push(command);
        state
    }
}

impl BenchDevice for RecordingMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        let mut state = self.record(MotorCommand::Connect);
        if state.fail_connect {
            return Err(DeviceError::connection_failed(&self.name, "scripted failure"));
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.record(MotorCommand::Disconnect);
        state.connected = false;
        state.moving = false;
    }

    fn is_connected(&self) -> bool {
        self.probe.is_connected()
    }
}

impl MotorActuator for RecordingMotor {
    fn home(&mut self) -> Result<(), ActuatorCommandError> {
        let mut state = self.record(MotorCommand::Home);
        if !state.connected {
            return Err(ActuatorCommandError::not_connected(&self.name));
        }
        if state.fail_home {
            return Err(ActuatorCommandError::timeout(&self.name, 500));
        }
        state.position = 0.0;
        state.moving = false;
        Ok(())
    }

    fn move_continuous(&mut self, velocity: f64) -> Result<(), ActuatorCommandError> {
        let mut state = self.record(MotorCommand::Move(velocity));
        if !state.connected {
            return Err(ActuatorCommandError::not_connected(&self.name));
        }
        if state.fail_move {
            return Err(ActuatorCommandError::rejected(
                &self.name,
                "move_continuous",
                "scripted failure",
            ));
        }
        state.moving = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuatorCommandError> {
        let mut state = self.record(MotorCommand::Stop);
        if !state.connected {
            return Err(ActuatorCommandError::not_connected(&self.name));
        }
        if state.stop_failures_remaining > 0 {
            state.stop_failures_remaining -= 1;
            return Err(ActuatorCommandError::communication(&self.name, "no acknowledgement"));
        }
        state.moving = false;
        Ok(())
    }

    fn get_position(&mut self) -> Result<f64, ActuatorCommandError> {
        let mut state = self.record(MotorCommand::GetPosition);
        if !state.connected {
            return Err(ActuatorCommandError::not_connected(&self.name));
        }
        if state.position_failures_remaining > 0 {
            state.position_failures_remaining -= 1;
            return Err(ActuatorCommandError::communication(&self.name, "position read failed"));
        }
        let position = state.position;
        if state.moving {
            state.position += state.position_step;
        }
        Ok(position)
    }

    fn is_moving(&self) -> bool {
        self.probe.is_moving()
    }
}

#[derive(Debug, Default)]
struct RunStore {
    headers: Vec<RunHeader>,
    samples: Vec<Sample>,
    opened: usize,
    closed: usize,
    discarded: usize,
    fail_open: bool,
    fail_after: Option<usize>,
}

/// Handle to everything a [`MemorySinkFactory`] recorded.
#[derive(Debug, Clone, Default)]
pub struct RecordedRuns {
    store: Arc<Mutex<RunStore>>,
}

impl RecordedRuns {
    /// Headers of every opened run, in order.
    pub fn headers(&self) -> Vec<RunHeader> {
        self.store.lock().headers.clone()
    }

    /// Every appended sample across all runs.
    pub fn samples(&self) -> Vec<Sample> {
        self.store.lock().samples.clone()
    }

    /// Continuous angles of every appended sample.
    pub fn angles(&self) -> Vec<f64> {
        self.store.lock().samples.iter().map(|s| s.angle).collect()
    }

    /// Number of sinks opened.
    pub fn opened(&self) -> usize {
        self.store.lock().opened
    }

    /// Number of sinks dropped.
    pub fn closed(&self) -> usize {
        self.store.lock().closed
    }

    /// Number of sinks given up before their run started.
    pub fn discarded(&self) -> usize {
        self.store.lock().discarded
    }

    /// Refuse to open new sinks.
    pub fn fail_open(&self, fail: bool) {
        self.store.lock().fail_open = fail;
    }

    /// Reject appends once `n` samples have been stored in total.
    pub fn fail_after(&self, n: usize) {
        self.store.lock().fail_after = Some(n);
    }
}

/// Sink that keeps samples in memory.
#[derive(Debug)]
pub struct MemorySink {
    runs: RecordedRuns,
}

impl DataSink for MemorySink {
    fn append(&mut self, sample: &Sample) -> Result<(), DurabilityError> {
        let mut store = self.runs.store.lock();
        if store.fail_after.is_some_and(|n| store.samples.len() >= n) {
            return Err(DurabilityError::io(
                "memory",
                io::Error::new(io::ErrorKind::StorageFull, "scripted disk full"),
            ));
        }
        store.samples.push(sample.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        String::from("memory sink")
    }

    fn discard(self: Box<Self>) {
        let mut store = self.runs.store.lock();
        store.discarded = store.discarded.saturating_add(1);
    }
}

impl Drop for MemorySink {
    fn drop(&mut self) {
        let mut store = self.runs.store.lock();
        store.closed = store.closed.saturating_add(1);
    }
}

/// Factory for [`MemorySink`]s sharing one [`RecordedRuns`].
#[derive(Debug, Clone, Default)]
pub struct MemorySinkFactory {
    runs: RecordedRuns,
}

impl MemorySinkFactory {
    /// New factory plus the handle to its recordings.
    pub fn new() -> (Self, RecordedRuns) {
        let factory = Self::default();
        let runs = factory.runs.clone();
        (factory, runs)
    }
}

impl SinkFactory for MemorySinkFactory {
    fn open_run(&mut self, header: &RunHeader) -> Result<Box<dyn DataSink>, DurabilityError> {
        {
            let mut store = self.runs.store.lock();
            if store.fail_open {
                return Err(DurabilityError::io(
                    "memory",
                    io::Error::new(io::ErrorKind::PermissionDenied, "scripted open failure"),
                ));
            }
            store.opened = store.opened.saturating_add(1);
            store.headers.push(header.clone());
        }
        Ok(Box::new(MemorySink {
            runs: self.runs.clone(),
        }))
    }
}
