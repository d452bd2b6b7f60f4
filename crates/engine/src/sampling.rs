//! The per-tick acquisition and limit evaluation.
//!
//! One call to [`SamplingLoop::tick`] performs, in order:
//!
//! 1. torque read (failure or timeout substitutes 0 V)
//! 2. angle read and unwrap (failure or a non-finite value substitutes the
//!    last raw angle)
//! 3. torque conversion
//! 4. elapsed time
//! 5. append to the sink (failure forces a stop)
//! 6. limit check, then angle tracking (a hit forces a stop in the same
//!    tick)
//!
//! Nothing is appended and no motion is commanded after step 6 has stopped
//! the run.

use chrono::Local;
use std::time::{Duration, Instant};
use torsion_config::{AngleSource, SamplingConfig};
use torsion_errors::{DurabilityError, MeasurementError, Result};
use torsion_hardware::SharedClock;
use tracing::{debug, info, warn};

use crate::machine::MeasurementStateMachine;
use crate::sample::{RunHeader, RunParameters, Sample};
use crate::sink::{DataSink, SinkFactory};
use crate::state::{MeasurementState, StopReason, StopReport};

/// Result of one tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Not running; nothing was read
    Idle,
    /// A sample was recorded and no limit was reached
    Sampled {
        /// The recorded sample
        sample: Sample,
        /// Number of channel reads that failed and were substituted
        sensor_faults: u8,
    },
    /// The run ended in this tick
    Stopped {
        /// The sample that triggered the stop, if one was taken
        sample: Option<Sample>,
        /// Why the run ended
        report: StopReport,
    },
    /// Stopping the run failed; the machine is in `Idle`
    Faulted {
        /// The hard fault
        error: MeasurementError,
    },
}

impl TickOutcome {
    /// The sample taken in this tick, if any.
    pub fn sample(&self) -> Option<&Sample> {
        match self {
            TickOutcome::Sampled { sample, .. } => Some(sample),
            TickOutcome::Stopped { sample, .. } => sample.as_ref(),
            TickOutcome::Idle | TickOutcome::Faulted { .. } => None,
        }
    }

    /// Whether the run ended in this tick.
    pub fn ended_run(&self) -> bool {
        matches!(
            self,
            TickOutcome::Stopped { .. } | TickOutcome::Faulted { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LastGood {
    angle_signal: f64,
    position: f64,
}

/// Drives the state machine tick by tick while a run is active.
pub struct SamplingLoop {
    machine: MeasurementStateMachine,
    sinks: Box<dyn SinkFactory>,
    sink: Option<Box<dyn DataSink>>,
    clock: SharedClock,
    read_timeout: Duration,
    angle_source: AngleSource,
    run_start: Option<Instant>,
    next_index: u64,
    last_good: LastGood,
    angle_misses: u32,
}

impl SamplingLoop {
    /// Wrap a state machine.
    pub fn new(
        machine: MeasurementStateMachine,
        sinks: Box<dyn SinkFactory>,
        clock: SharedClock,
        sampling: &SamplingConfig,
    ) -> Self {
        Self {
            machine,
            sinks,
            sink: None,
            clock,
            read_timeout: sampling.read_timeout(),
            angle_source: sampling.angle_source,
            run_start: None,
            next_index: 0,
            last_good: LastGood::default(),
            angle_misses: 0,
        }
    }

    /// The state machine.
    pub fn machine(&self) -> &MeasurementStateMachine {
        &self.machine
    }

    /// The state machine, for operations outside a run (activate, home,
    /// calibrate, read).
    pub fn machine_mut(&mut self) -> &mut MeasurementStateMachine {
        &mut self.machine
    }

    /// Current state.
    pub fn state(&self) -> MeasurementState {
        self.machine.state()
    }

    /// Samples taken in the current or last run.
    pub fn samples_taken(&self) -> u64 {
        self.next_index
    }

    /// Time since the current run started.
    pub fn run_elapsed(&self) -> Option<Duration> {
        self.run_start
            .map(|start| self.clock.now().saturating_duration_since(start))
    }

    /// Open a sink for a new run, then start the motor.
    ///
    /// The sink is opened (and its header written) before any motion is
    /// commanded, so a run never moves without a place to record.
    ///
    /// # Errors
    ///
    /// Transition and validation errors are reported before the sink is
    /// opened. [`MeasurementError::Durability`] if the sink cannot be
    /// created. Any [`MeasurementStateMachine::start_run`] error, in which
    /// case the new sink is passed to [`DataSink::discard`].
    pub fn begin_run(&mut self, params: RunParameters, sample_name: &str) -> Result<RunHeader> {
        self.machine.ensure_can_start()?;
        self.machine.check_parameters(&params)?;

        let header = RunHeader {
            started_at: Local::now(),
            sample_name: sample_name.to_string(),
            parameters: params,
            torque_scale: self.machine.torque_scale(),
            period: self.machine.sampling().period(),
        };
        let sink = self.sinks.open_run(&header)?;

        if let Err(err) = self.machine.start_run(params) {
            sink.discard();
            return Err(err);
        }

        info!(sink = %sink.describe(), sample = sample_name, "recording run");
        self.sink = Some(sink);
        self.run_start = Some(self.clock.now());
        self.next_index = 0;
        self.last_good = LastGood::default();
        self.angle_misses = 0;
        Ok(header)
    }

    /// Operator stop of the current run.
    ///
    /// # Errors
    ///
    /// As [`MeasurementStateMachine::stop_run`].
    pub fn end_run(&mut self) -> Result<StopReport> {
        let result = self.machine.stop_run();
        if !matches!(result, Err(MeasurementError::Transition(_))) {
            self.close_sink();
        }
        result
    }

    /// Deactivate the hardware, stopping a run first if needed.
    ///
    /// # Errors
    ///
    /// As [`MeasurementStateMachine::deactivate_hardware`].
    pub fn deactivate(&mut self) -> Result<()> {
        let result = self.machine.deactivate_hardware();
        self.close_sink();
        result
    }

    fn close_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            debug!(sink = %sink.describe(), samples = self.next_index, "sink closed");
        }
        self.run_start = None;
    }

    /// Run one tick. A no-op unless `Running`.
    pub fn tick(&mut self) -> TickOutcome {
        if self.machine.state() != MeasurementState::Running {
            return TickOutcome::Idle;
        }
        let Some(run_start) = self.run_start else {
            return TickOutcome::Idle;
        };
        let mut sensor_faults = 0u8;

        // 1. Torque
        let torque_voltage = match self.read_torque() {
            Some(volts) => volts,
            None => {
                sensor_faults = sensor_faults.saturating_add(1);
                0.0
            }
        };

        // 2. Angle
        let (angle_signal, angle) = match self.read_angle() {
            Some(reading) => {
                self.angle_misses = 0;
                reading
            }
            None => {
                sensor_faults = sensor_faults.saturating_add(1);
                self.angle_misses = self.angle_misses.saturating_add(1);
                self.substitute_angle()
            }
        };

        // 3-4.
        let torque = torque_voltage * self.machine.torque_scale();
        let elapsed = self.clock.now().saturating_duration_since(run_start);

        let sample = Sample {
            index: self.next_index,
            elapsed,
            torque_voltage,
            angle_signal,
            torque,
            angle,
        };
        self.next_index = self.next_index.saturating_add(1);

        // 5. Durability before anything else may continue the run.
        if let Err(err) = self.append(&sample) {
            let report = StopReport::new(StopReason::Durability {
                detail: err.to_string(),
            })
            .at_sample(sample.index, elapsed);
            return self.stop_in_tick(Some(sample), report);
        }

        // 6. Limits, then tracking
        if let Some(reason) = self
            .machine
            .stop_condition(&sample)
            .or_else(|| self.tracking_lost())
        {
            let report = StopReport::new(reason).at_sample(sample.index, elapsed);
            return self.stop_in_tick(Some(sample), report);
        }

        TickOutcome::Sampled {
            sample,
            sensor_faults,
        }
    }

    /// After `k` missed angle reads the next good read spans `k + 1` ticks
    /// of travel. Once that span can reach the wrap threshold the unwrapper
    /// may miscount a turn, so the run has to end.
    fn tracking_lost(&self) -> Option<StopReason> {
        if self.angle_misses == 0 || self.angle_source != AngleSource::Sensor {
            return None;
        }
        let per_tick = self.machine.parameters().velocity.abs()
            * self.machine.sampling().period().as_secs_f64();
        let span = per_tick * (f64::from(self.angle_misses) + 1.0);
        if span < self.machine.unwrapper().wrap_threshold() {
            return None;
        }
        warn!(
            missed_reads = self.angle_misses,
            span_deg = span,
            "angle can no longer be tracked across missed reads"
        );
        Some(StopReason::AngleTrackingLost {
            missed_reads: self.angle_misses,
        })
    }

    fn stop_in_tick(&mut self, sample: Option<Sample>, report: StopReport) -> TickOutcome {
        let result = self.machine.force_stop(report);
        self.close_sink();
        match result {
            Ok(report) => TickOutcome::Stopped { sample, report },
            Err(error) => TickOutcome::Faulted { error },
        }
    }

    fn append(&mut self, sample: &Sample) -> std::result::Result<(), DurabilityError> {
        match self.sink.as_mut() {
            Some(sink) => sink.append(sample),
            None => Err(DurabilityError::closed("run sink")),
        }
    }

    fn read_torque(&mut self) -> Option<f64> {
        let started = self.clock.now();
        let result = self.machine.read_torque_voltage();
        let took = self.clock.now().saturating_duration_since(started);
        match result {
            Ok(_) if took > self.read_timeout => {
                warn!(took_ms = took.as_millis(), "torque read exceeded timeout, substituting 0 V");
                None
            }
            Ok(volts) => Some(volts),
            Err(err) => {
                warn!(%err, "torque read failed, substituting 0 V");
                None
            }
        }
    }

    /// Returns `(angle_signal, continuous_angle)`.
    fn read_angle(&mut self) -> Option<(f64, f64)> {
        let started = self.clock.now();
        match self.angle_source {
            AngleSource::Sensor => {
                let result = self.machine.read_angle_channel();
                let took = self.clock.now().saturating_duration_since(started);
                match result {
                    Ok(_) if took > self.read_timeout => {
                        warn!(took_ms = took.as_millis(), "angle read exceeded timeout, holding last angle");
                        None
                    }
                    Ok((voltage, raw)) => {
                        self.last_good.angle_signal = voltage;
                        Some((voltage, self.machine.unwrapper_mut().unwrap(raw)))
                    }
                    Err(err) => {
                        warn!(%err, "angle read failed, holding last angle");
                        None
                    }
                }
            }
            AngleSource::MotorPosition => {
                let result = self.machine.hardware_mut().motor.get_position();
                let took = self.clock.now().saturating_duration_since(started);
                match result {
                    Ok(_) if took > self.read_timeout => {
                        warn!(took_ms = took.as_millis(), "position read exceeded timeout, holding last angle");
                        None
                    }
                    Ok(position) if !position.is_finite() => {
                        warn!(position, "motor reported a non-finite position, holding last angle");
                        None
                    }
                    Ok(position) => {
                        self.last_good.position = position;
                        Some((position, position))
                    }
                    Err(err) => {
                        warn!(%err, "position read failed, holding last angle");
                        None
                    }
                }
            }
        }
    }

    /// Hold the last good angle. Feeding the last raw angle to the unwrapper
    /// would yield the same continuous angle, so it is not touched.
    fn substitute_angle(&self) -> (f64, f64) {
        match self.angle_source {
            AngleSource::Sensor => (
                self.last_good.angle_signal,
                self.machine.unwrapper().continuous_angle(),
            ),
            AngleSource::MotorPosition => (self.last_good.position, self.last_good.position),
        }
    }
}

impl std::fmt::Debug for SamplingLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingLoop")
            .field("machine", &self.machine)
            .field("recording", &self.sink.is_some())
            .field("samples_taken", &self.next_index)
            .finish_non_exhaustive()
    }
}
