//! Control thread that owns the sampling loop.
//!
//! The thread waits for each scheduler deadline, drains operator commands,
//! then runs exactly one tick. Commands therefore never interleave with a
//! tick, and an operator stop takes effect at the next tick boundary.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use torsion_errors::MeasurementError;
use torsion_scheduler::{SchedError, TickScheduler};
use tracing::{debug, error, info, warn};

use crate::machine::Reading;
use crate::sample::{RunHeader, RunParameters};
use crate::sampling::{SamplingLoop, TickOutcome};
use crate::state::{MeasurementState, StopReport};

const COMMAND_QUEUE: usize = 64;
const EVENT_QUEUE: usize = 1024;

/// Errors reported by [`MeasurementRunner`].
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The operation itself failed
    #[error(transparent)]
    Measurement(#[from] MeasurementError),

    /// The control thread has exited
    #[error("Control thread is not running")]
    Disconnected,

    /// The command queue is full
    #[error("Control thread command queue is full")]
    Busy,

    /// The control thread could not be started
    #[error("Failed to spawn control thread: {0}")]
    Spawn(#[source] std::io::Error),
}

type Reply<T> = Sender<Result<T, MeasurementError>>;

/// Operator request, handled at the next tick boundary.
#[derive(Debug)]
pub enum RunnerCommand {
    /// Connect all devices
    Activate {
        /// Result channel
        reply: Reply<()>,
    },
    /// Disconnect all devices, stopping a run first
    Deactivate {
        /// Result channel
        reply: Reply<()>,
    },
    /// Open a record and start the motor
    Start {
        /// Run parameters
        params: RunParameters,
        /// Sample name for the record
        sample_name: String,
        /// Result channel
        reply: Reply<RunHeader>,
    },
    /// Operator stop
    Stop {
        /// Result channel
        reply: Reply<StopReport>,
    },
    /// Replace the stored run parameters
    SetParameters {
        /// New parameters
        params: RunParameters,
        /// Result channel
        reply: Reply<()>,
    },
    /// Drive the motor to its reference
    Home {
        /// Result channel
        reply: Reply<()>,
    },
    /// Zero the torque channel
    CalibrateZero {
        /// Result channel
        reply: Reply<()>,
    },
    /// Read both channels once
    ReadOnce {
        /// Result channel
        reply: Reply<Reading>,
    },
    /// Deactivate and end the control thread
    Shutdown,
}

/// Published by the control thread. Dropped when nobody keeps up.
#[derive(Debug)]
pub enum RunnerEvent {
    /// A tick did something other than idle
    Tick(TickOutcome),
    /// The state machine changed state
    StateChanged {
        /// Previous state
        from: MeasurementState,
        /// New state
        to: MeasurementState,
    },
    /// A tick started later than the overrun limit allows
    DeadlineMissed {
        /// Tick number
        tick: u64,
        /// How late
        lateness: Duration,
    },
}

struct ControlContext {
    sampling: SamplingLoop,
    scheduler: TickScheduler,
    command_rx: Receiver<RunnerCommand>,
    event_tx: Sender<RunnerEvent>,
    running: Arc<AtomicBool>,
    last_state: MeasurementState,
    dropped_events: u64,
}

impl ControlContext {
    fn publish(&mut self, event: RunnerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped_events = self.dropped_events.saturating_add(1);
                if self.dropped_events.is_power_of_two() {
                    warn!(dropped = self.dropped_events, "event queue full, dropping events");
                }
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn note_state(&mut self) {
        let state = self.sampling.state();
        if state != self.last_state {
            let from = self.last_state;
            self.last_state = state;
            debug!(from = from.as_str(), to = state.as_str(), "state changed");
            self.publish(RunnerEvent::StateChanged { from, to: state });
        }
    }
}

fn send_reply<T>(reply: &Reply<T>, result: Result<T, MeasurementError>) {
    if reply.send(result).is_err() {
        debug!("caller went away before the reply");
    }
}

/// Handle to the control thread.
pub struct MeasurementRunner {
    command_tx: Option<Sender<RunnerCommand>>,
    event_rx: Receiver<RunnerEvent>,
    thread: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl MeasurementRunner {
    /// Start the control thread with the given tick period.
    ///
    /// # Errors
    ///
    /// [`RunnerError::Spawn`] if the thread cannot be created.
    pub fn spawn(sampling: SamplingLoop, period: Duration) -> Result<Self, RunnerError> {
        let (command_tx, command_rx) = channel::bounded(COMMAND_QUEUE);
        let (event_tx, event_rx) = channel::bounded(EVENT_QUEUE);
        let running = Arc::new(AtomicBool::new(true));

        let ctx = ControlContext {
            last_state: sampling.state(),
            sampling,
            scheduler: TickScheduler::with_period(period),
            command_rx,
            event_tx,
            running: running.clone(),
            dropped_events: 0,
        };

        let thread = thread::Builder::new()
            .name("torsion-control".to_string())
            .spawn(move || Self::control_thread_main(ctx))
            .map_err(RunnerError::Spawn)?;

        info!(period_ms = period.as_millis(), "control thread started");
        Ok(Self {
            command_tx: Some(command_tx),
            event_rx,
            thread: Some(thread),
            running,
        })
    }

    /// Events from the control thread.
    pub fn events(&self) -> &Receiver<RunnerEvent> {
        &self.event_rx
    }

    /// Whether the control thread is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RunnerCommand,
    ) -> Result<T, RunnerError> {
        let command_tx = self.command_tx.as_ref().ok_or(RunnerError::Disconnected)?;
        let (reply_tx, reply_rx) = channel::bounded(1);
        command_tx.try_send(make(reply_tx)).map_err(|e| match e {
            TrySendError::Full(_) => RunnerError::Busy,
            TrySendError::Disconnected(_) => RunnerError::Disconnected,
        })?;
        let result = reply_rx.recv().ok().ok_or(RunnerError::Disconnected)?;
        Ok(result?)
    }

    /// Connect all devices.
    ///
    /// # Errors
    ///
    /// See [`MeasurementStateMachine::activate_hardware`](crate::MeasurementStateMachine::activate_hardware).
    pub fn activate(&self) -> Result<(), RunnerError> {
        self.request(|reply| RunnerCommand::Activate { reply })
    }

    /// Disconnect all devices.
    ///
    /// # Errors
    ///
    /// See [`SamplingLoop::deactivate`].
    pub fn deactivate(&self) -> Result<(), RunnerError> {
        self.request(|reply| RunnerCommand::Deactivate { reply })
    }

    /// Start a recorded run.
    ///
    /// # Errors
    ///
    /// See [`SamplingLoop::begin_run`].
    pub fn start(&self, params: RunParameters, sample_name: &str) -> Result<RunHeader, RunnerError> {
        let sample_name = sample_name.to_string();
        self.request(|reply| RunnerCommand::Start {
            params,
            sample_name,
            reply,
        })
    }

    /// Operator stop.
    ///
    /// # Errors
    ///
    /// See [`SamplingLoop::end_run`].
    pub fn stop(&self) -> Result<StopReport, RunnerError> {
        self.request(|reply| RunnerCommand::Stop { reply })
    }

    /// Replace the stored run parameters.
    ///
    /// # Errors
    ///
    /// Rejected while running.
    pub fn set_parameters(&self, params: RunParameters) -> Result<(), RunnerError> {
        self.request(|reply| RunnerCommand::SetParameters { params, reply })
    }

    /// Home the motor.
    ///
    /// # Errors
    ///
    /// See [`MeasurementStateMachine::home`](crate::MeasurementStateMachine::home).
    pub fn home(&self) -> Result<(), RunnerError> {
        self.request(|reply| RunnerCommand::Home { reply })
    }

    /// Zero the torque channel.
    ///
    /// # Errors
    ///
    /// See [`MeasurementStateMachine::calibrate_zero`](crate::MeasurementStateMachine::calibrate_zero).
    pub fn calibrate_zero(&self) -> Result<(), RunnerError> {
        self.request(|reply| RunnerCommand::CalibrateZero { reply })
    }

    /// Read both channels once.
    ///
    /// # Errors
    ///
    /// See [`MeasurementStateMachine::read_once`](crate::MeasurementStateMachine::read_once).
    pub fn read_once(&self) -> Result<Reading, RunnerError> {
        self.request(|reply| RunnerCommand::ReadOnce { reply })
    }

    /// Deactivate the hardware and join the control thread.
    pub fn shutdown(mut self) {
        self.shutdown_blocking();
    }

    fn shutdown_blocking(&mut self) {
        if let Some(command_tx) = self.command_tx.take()
            && command_tx.try_send(RunnerCommand::Shutdown).is_err()
        {
            // Queue full or thread gone; the flag still ends the loop.
            debug!("shutdown command not queued");
        }
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.thread.take() {
            match handle.join() {
                Ok(()) => info!("control thread stopped cleanly"),
                Err(_) => error!("control thread panicked"),
            }
        }
    }

    fn control_thread_main(mut ctx: ControlContext) {
        while ctx.running.load(Ordering::Acquire) {
            match ctx.scheduler.wait_for_tick() {
                Ok(_) => {}
                Err(SchedError::TimingViolation { tick, lateness }) => {
                    warn!(tick, lateness_ms = lateness.as_millis(), "tick deadline missed");
                    ctx.publish(RunnerEvent::DeadlineMissed { tick, lateness });
                }
                Err(err) => {
                    error!(%err, "scheduler failed");
                    break;
                }
            }

            if !Self::process_commands(&mut ctx) {
                break;
            }

            let outcome = ctx.sampling.tick();
            if let TickOutcome::Faulted { error } = &outcome {
                error!(%error, "run ended in a hard fault");
            }
            if !matches!(outcome, TickOutcome::Idle) {
                ctx.publish(RunnerEvent::Tick(outcome));
            }
            ctx.note_state();
        }

        if let Err(err) = ctx.sampling.deactivate() {
            error!(%err, "deactivation on shutdown failed");
        }
        ctx.note_state();
        ctx.running.store(false, Ordering::Release);
        info!("control thread stopping");
    }

    /// Handle every queued command. Returns `false` on shutdown.
    fn process_commands(ctx: &mut ControlContext) -> bool {
        while let Ok(command) = ctx.command_rx.try_recv() {
            match command {
                RunnerCommand::Activate { reply } => {
                    let result = ctx.sampling.machine_mut().activate_hardware();
                    send_reply(&reply, result);
                }
                RunnerCommand::Deactivate { reply } => {
                    let result = ctx.sampling.deactivate();
                    send_reply(&reply, result);
                }
                RunnerCommand::Start {
                    params,
                    sample_name,
                    reply,
                } => {
                    let result = ctx.sampling.begin_run(params, &sample_name);
                    send_reply(&reply, result);
                }
                RunnerCommand::Stop { reply } => {
                    let result = ctx.sampling.end_run();
                    send_reply(&reply, result);
                }
                RunnerCommand::SetParameters { params, reply } => {
                    let result = ctx.sampling.machine_mut().set_parameters(params);
                    send_reply(&reply, result);
                }
                RunnerCommand::Home { reply } => {
                    let result = ctx.sampling.machine_mut().home();
                    send_reply(&reply, result);
                }
                RunnerCommand::CalibrateZero { reply } => {
                    let result = ctx.sampling.machine_mut().calibrate_zero();
                    send_reply(&reply, result);
                }
                RunnerCommand::ReadOnce { reply } => {
                    let result = ctx.sampling.machine_mut().read_once();
                    send_reply(&reply, result);
                }
                RunnerCommand::Shutdown => {
                    info!("received shutdown command");
                    return false;
                }
            }
            ctx.note_state();
        }
        true
    }
}

impl Drop for MeasurementRunner {
    fn drop(&mut self) {
        if self.thread.is_some() {
            debug!("runner dropped, shutting down control thread");
            self.shutdown_blocking();
        }
    }
}

impl std::fmt::Debug for MeasurementRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementRunner")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
