//! Measurement state machine.
//!
//! Owns the bench hardware and the angle unwrapper and is the only place
//! that commands motion. Every operation checks the current state first; an
//! operation that is not allowed returns an [`InvalidTransitionError`]
//! without touching hardware or state.

use std::thread;
use torsion_config::{BenchConfig, SafetyConfig, SamplingConfig};
use torsion_errors::{
    ErrorSeverity, InvalidTransitionError, MeasurementError, Result, SensorReadError,
};
use torsion_hardware::BenchHardware;
use tracing::{debug, error, info, warn};

use crate::sample::{RunParameters, Sample};
use crate::state::{Alert, MeasurementState, StopReason, StopReport};
use crate::unwrap::AngleUnwrapper;

const MAX_ALERTS: usize = 64;

/// One manual reading of both channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Torque channel voltage
    pub torque_voltage: f64,
    /// Torque in Nm
    pub torque: f64,
    /// Angle channel voltage
    pub angle_voltage: f64,
    /// Angle within one turn, degrees
    pub raw_angle: f64,
}

/// Gatekeeper for every hardware action of a measurement.
pub struct MeasurementStateMachine {
    hardware: BenchHardware,
    unwrapper: AngleUnwrapper,
    parameters: RunParameters,
    state: MeasurementState,
    last_stop: Option<StopReport>,
    alerts: Vec<Alert>,
    safety: SafetyConfig,
    sampling: SamplingConfig,
    torque_scale: f64,
}

impl MeasurementStateMachine {
    /// Build an idle machine around the given hardware.
    pub fn new(hardware: BenchHardware, config: &BenchConfig) -> Self {
        Self {
            hardware,
            unwrapper: AngleUnwrapper::with_wrap_threshold(config.sampling.wrap_threshold_deg),
            parameters: RunParameters::from_defaults(&config.run),
            state: MeasurementState::Idle,
            last_stop: None,
            alerts: Vec::new(),
            safety: config.safety.clone(),
            sampling: config.sampling.clone(),
            torque_scale: config.torque_channel.scale_nm_per_volt,
        }
    }

    /// Current state.
    pub fn state(&self) -> MeasurementState {
        self.state
    }

    /// Parameters of the current or next run.
    pub fn parameters(&self) -> &RunParameters {
        &self.parameters
    }

    /// How the last run ended. Cleared when a new run starts.
    pub fn last_stop(&self) -> Option<&StopReport> {
        self.last_stop.as_ref()
    }

    /// Alerts raised so far, oldest first.
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// The angle unwrapper.
    pub fn unwrapper(&self) -> &AngleUnwrapper {
        &self.unwrapper
    }

    /// Torque conversion factor in Nm/V.
    pub fn torque_scale(&self) -> f64 {
        self.torque_scale
    }

    /// Sampling settings the machine validates runs against.
    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    pub(crate) fn unwrapper_mut(&mut self) -> &mut AngleUnwrapper {
        &mut self.unwrapper
    }

    pub(crate) fn hardware_mut(&mut self) -> &mut BenchHardware {
        &mut self.hardware
    }

    fn reject(&self, operation: &'static str) -> MeasurementError {
        debug!(state = self.state.as_str(), operation, "transition rejected");
        InvalidTransitionError::new(self.state.as_str(), operation).into()
    }

    fn raise(&mut self, severity: ErrorSeverity, message: impl Into<String>) {
        if self.alerts.len() >= MAX_ALERTS {
            self.alerts.remove(0);
        }
        self.alerts.push(Alert::new(severity, message));
    }

    /// Connect all devices. Legal only from `Idle`.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Transition`] outside `Idle`;
    /// [`MeasurementError::Activation`] listing every device that failed, in
    /// which case the others have been disconnected again.
    pub fn activate_hardware(&mut self) -> Result<()> {
        if self.state != MeasurementState::Idle {
            return Err(self.reject("activate_hardware"));
        }

        if let Err(err) = self.hardware.connect_all() {
            error!(%err, "hardware activation failed");
            self.raise(ErrorSeverity::Error, err.to_string());
            return Err(err.into());
        }

        self.state = MeasurementState::HardwareActive;
        info!("hardware active");
        Ok(())
    }

    /// Check whether a run could start now, without side effects.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Transition`] unless the hardware is ready.
    pub fn ensure_can_start(&self) -> Result<()> {
        if self.state.is_ready() {
            Ok(())
        } else {
            Err(self.reject("start_run"))
        }
    }

    /// Validate run parameters against the value rules and the sampling
    /// settings.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Validation`] for the first violation.
    pub fn check_parameters(&self, params: &RunParameters) -> Result<()> {
        params.validate()?;
        params.check_trackable(&self.sampling)?;
        Ok(())
    }

    /// Start a run: reset the unwrapper and command continuous motion.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Transition`] unless `HardwareActive` or `Stopped`
    /// (in particular while already `Running`);
    /// [`MeasurementError::Validation`] for bad parameters;
    /// [`MeasurementError::Actuator`] if the motor refused to move, in which
    /// case the state is unchanged.
    pub fn start_run(&mut self, params: RunParameters) -> Result<()> {
        self.ensure_can_start()?;
        self.check_parameters(&params)?;

        if let Err(err) = self.hardware.motor.move_continuous(params.velocity) {
            error!(%err, "motor did not start");
            if let Err(stop_err) = self.hardware.motor.stop() {
                warn!(%stop_err, "stop after failed start also failed");
            }
            return Err(err.into());
        }

        // The first tick of the run follows this call.
        self.unwrapper.reset();
        self.parameters = params;
        self.last_stop = None;
        self.state = MeasurementState::Running;
        info!(
            max_angle = params.max_angle,
            max_torque = params.max_torque,
            velocity = params.velocity,
            "run started"
        );
        Ok(())
    }

    /// Operator stop. Legal only while `Running`; ends in `HardwareActive`.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Transition`] outside `Running`;
    /// [`MeasurementError::HardFault`] if the motor could not be stopped.
    pub fn stop_run(&mut self) -> Result<StopReport> {
        if self.state != MeasurementState::Running {
            return Err(self.reject("stop_run"));
        }
        self.finish_run(StopReport::new(StopReason::Operator), MeasurementState::HardwareActive)
    }

    /// Stop forced by a limit or a fault. Legal only while `Running`; ends
    /// in `Stopped`.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Transition`] outside `Running`;
    /// [`MeasurementError::HardFault`] if the motor could not be stopped.
    pub fn force_stop(&mut self, report: StopReport) -> Result<StopReport> {
        if self.state != MeasurementState::Running {
            return Err(self.reject("force_stop"));
        }
        self.finish_run(report, MeasurementState::Stopped)
    }

    fn finish_run(&mut self, report: StopReport, next: MeasurementState) -> Result<StopReport> {
        self.halt_motor()?;

        if report.reason.is_forced() {
            warn!(reason = %report, "run stopped");
            self.raise(ErrorSeverity::Warning, report.to_string());
        } else {
            info!(reason = %report, "run stopped");
        }
        self.last_stop = Some(report.clone());
        self.state = next;
        Ok(report)
    }

    /// Send `stop` until it is confirmed or the attempts run out.
    ///
    /// When every attempt fails the bench is unsafe: all devices are
    /// disconnected, the machine drops to `Idle` and a critical alert is
    /// raised.
    fn halt_motor(&mut self) -> Result<()> {
        let attempts = self.safety.stop_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.hardware.motor.stop() {
                Ok(()) => {
                    if attempt > 1 {
                        info!(attempt, "motor stopped after retry");
                    }
                    return Ok(());
                }
                Err(err) if attempt < attempts => {
                    warn!(attempt, attempts, %err, "stop not confirmed, retrying");
                    thread::sleep(self.safety.stop_retry_delay());
                }
                Err(err) => {
                    let device = self.hardware.motor.name().to_string();
                    let fault = MeasurementError::hard_fault(device, attempts, err);
                    error!(%fault, "motor could not be stopped, disconnecting all devices");
                    self.hardware.disconnect_all();
                    self.state = MeasurementState::Idle;
                    self.raise(ErrorSeverity::Critical, fault.to_string());
                    return Err(fault);
                }
            }
        }
    }

    /// Disconnect all devices and return to `Idle`.
    ///
    /// A running measurement is stopped first. Calling this while `Idle` is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::HardFault`] if the implicit stop failed; the
    /// devices are disconnected and the state is `Idle` regardless.
    pub fn deactivate_hardware(&mut self) -> Result<()> {
        match self.state {
            MeasurementState::Idle => return Ok(()),
            MeasurementState::Running => {
                self.finish_run(
                    StopReport::new(StopReason::Deactivated),
                    MeasurementState::HardwareActive,
                )?;
            }
            MeasurementState::HardwareActive | MeasurementState::Stopped => {}
        }

        self.hardware.disconnect_all();
        self.state = MeasurementState::Idle;
        info!("hardware deactivated");
        Ok(())
    }

    /// Replace the run parameters. Rejected while `Running`.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Transition`] while `Running`;
    /// [`MeasurementError::Validation`] for bad values.
    pub fn set_parameters(&mut self, params: RunParameters) -> Result<()> {
        if self.state == MeasurementState::Running {
            return Err(self.reject("set_parameters"));
        }
        params.validate()?;
        self.parameters = params;
        Ok(())
    }

    /// Drive the motor to its reference and reset the unwrapper.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Transition`] unless the hardware is ready;
    /// [`MeasurementError::Actuator`] if homing failed.
    pub fn home(&mut self) -> Result<()> {
        if !self.state.is_ready() {
            return Err(self.reject("home"));
        }
        self.hardware.motor.home()?;
        self.unwrapper.reset();
        info!("motor homed, angle reference reset");
        Ok(())
    }

    /// Zero the torque channel under the current load.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Transition`] unless the hardware is ready;
    /// [`MeasurementError::Sensor`] if the reference reading failed.
    pub fn calibrate_zero(&mut self) -> Result<()> {
        if !self.state.is_ready() {
            return Err(self.reject("calibrate_zero"));
        }
        self.hardware.torque.calibrate_zero()?;
        info!("torque zero calibrated");
        Ok(())
    }

    /// Read both channels once, outside of a run.
    ///
    /// # Errors
    ///
    /// [`MeasurementError::Transition`] unless the hardware is ready;
    /// [`MeasurementError::Sensor`] if either read failed.
    pub fn read_once(&mut self) -> Result<Reading> {
        if !self.state.is_ready() {
            return Err(self.reject("read_once"));
        }
        let torque_voltage = self.read_torque_voltage()?;
        let (angle_voltage, raw_angle) = self.read_angle_channel()?;
        Ok(Reading {
            torque_voltage,
            torque: torque_voltage * self.torque_scale,
            angle_voltage,
            raw_angle,
        })
    }

    /// Limit check for one sample: angle first, then torque. Both limits are
    /// symmetric and inclusive.
    pub fn stop_condition(&self, sample: &Sample) -> Option<StopReason> {
        let limits = &self.parameters;
        if sample.angle.abs() >= limits.max_angle {
            return Some(StopReason::AngleLimit {
                angle: sample.angle,
                limit: limits.max_angle,
            });
        }
        if sample.torque.abs() >= limits.max_torque {
            return Some(StopReason::TorqueLimit {
                torque: sample.torque,
                limit: limits.max_torque,
            });
        }
        None
    }

    /// Read the torque channel. A non-finite voltage is an invalid reading.
    pub(crate) fn read_torque_voltage(&mut self) -> std::result::Result<f64, SensorReadError> {
        let volts = self.hardware.torque.read_voltage()?;
        finite_reading(self.hardware.torque.name(), "voltage", volts)
    }

    /// Read the angle channel as `(voltage, raw_angle)`. A non-finite voltage
    /// or angle is an invalid reading and never reaches the unwrapper.
    pub(crate) fn read_angle_channel(
        &mut self,
    ) -> std::result::Result<(f64, f64), SensorReadError> {
        let (voltage, raw) = self.hardware.angle.read_raw_angle()?;
        let device = self.hardware.angle.name();
        finite_reading(device, "voltage", voltage)?;
        finite_reading(device, "angle", raw)?;
        Ok((voltage, raw))
    }
}

fn finite_reading(
    device: &str,
    what: &str,
    value: f64,
) -> std::result::Result<f64, SensorReadError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SensorReadError::invalid_reading(
            device,
            format!("{what} is {value}"),
        ))
    }
}

impl std::fmt::Debug for MeasurementStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementStateMachine")
            .field("state", &self.state)
            .field("parameters", &self.parameters)
            .field("hardware", &self.hardware)
            .field("last_stop", &self.last_stop)
            .finish_non_exhaustive()
    }
}
