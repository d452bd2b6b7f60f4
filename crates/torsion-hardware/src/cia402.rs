//! CiA-402 drive in profile velocity mode.
//!
//! The drive is reached through an [`ObjectDictionary`] transport (CANopen
//! SDO, EtherCAT CoE, a vendor library). This module only sequences the
//! state machine of the drive profile; the transport is supplied by the
//! caller.

use thiserror::Error;
use torsion_config::{MotorBackend, MotorConfig};
use torsion_errors::{ActuatorCommandError, DeviceError};
use tracing::{debug, info, warn};

use crate::traits::{BenchDevice, MotorActuator};

/// Object dictionary indices used by the drive.
pub mod od {
    /// Control word
    pub const CONTROL_WORD: u16 = 0x6040;
    /// Status word
    pub const STATUS_WORD: u16 = 0x6041;
    /// Modes of operation
    pub const MODE_OF_OPERATION: u16 = 0x6060;
    /// Homing method
    pub const HOMING_METHOD: u16 = 0x6098;
    /// Actual position in encoder counts
    pub const POSITION_ACTUAL: u16 = 0x6064;
    /// Actual velocity in rpm
    pub const VELOCITY_ACTUAL: u16 = 0x606C;
    /// Target velocity in rpm
    pub const TARGET_VELOCITY: u16 = 0x60FF;
}

/// Control word values.
pub mod control {
    /// Ready to switch on
    pub const SHUTDOWN: i64 = 0x0006;
    /// Switched on
    pub const SWITCH_ON: i64 = 0x0007;
    /// Operation enabled
    pub const ENABLE_OPERATION: i64 = 0x000F;
    /// Quick stop active
    pub const QUICK_STOP: i64 = 0x0002;
    /// Switch on disabled
    pub const DISABLE_VOLTAGE: i64 = 0x0000;
    /// Operation enabled with the homing start bit (bit 4) set
    pub const START_HOMING: i64 = 0x001F;
}

/// Modes of operation values.
pub mod mode {
    /// Profile velocity mode
    pub const PROFILE_VELOCITY: i64 = 3;
    /// Homing mode
    pub const HOMING: i64 = 6;
}

/// Status word bit 12 in homing mode: reference reached.
const STATUS_HOMING_ATTAINED: i64 = 1 << 12;
/// Status word bit 13 in homing mode: homing error.
const STATUS_HOMING_ERROR: i64 = 1 << 13;
/// Homing method 35: current position becomes zero.
const HOMING_ON_CURRENT_POSITION: i64 = 35;

/// Object dictionary transport error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OdError {
    /// No answer within the transport timeout
    #[error("object dictionary access timed out")]
    Timeout,
    /// The drive aborted the access
    #[error("access to {index:#06x}:{sub} aborted with code {code:#010x}")]
    Abort {
        /// Object index
        index: u16,
        /// Sub index
        sub: u8,
        /// Abort code reported by the drive
        code: u32,
    },
    /// The transport itself failed
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Read/write access to a drive's object dictionary.
pub trait ObjectDictionary: Send {
    /// Open the transport.
    ///
    /// # Errors
    ///
    /// Returns an [`OdError`] if the drive cannot be reached.
    fn open(&mut self) -> Result<(), OdError>;

    /// Close the transport.
    fn close(&mut self);

    /// Read an object.
    ///
    /// # Errors
    ///
    /// Returns an [`OdError`] on timeout, abort or transport failure.
    fn read(&mut self, index: u16, sub: u8) -> Result<i64, OdError>;

    /// Write an object.
    ///
    /// # Errors
    ///
    /// Returns an [`OdError`] on timeout, abort or transport failure.
    fn write(&mut self, index: u16, sub: u8, value: i64) -> Result<(), OdError>;
}

/// Drive settings taken from [`MotorConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct Cia402Settings {
    /// Node id on the bus
    pub node_id: u8,
    /// Encoder counts per motor revolution
    pub encoder_counts_per_rev: u32,
    /// Status word polls allowed while homing
    pub homing_poll_limit: u32,
    /// Command timeout reported in errors
    pub command_timeout_ms: u64,
}

impl Cia402Settings {
    /// Extract the drive settings, if the CiA-402 backend is selected.
    pub fn from_config(config: &MotorConfig) -> Option<Self> {
        match config.backend {
            MotorBackend::Cia402 {
                node_id,
                encoder_counts_per_rev,
                homing_poll_limit,
            } => Some(Self {
                node_id,
                encoder_counts_per_rev,
                homing_poll_limit,
                command_timeout_ms: config.command_timeout_ms,
            }),
            MotorBackend::Simulated => None,
        }
    }
}

impl Default for Cia402Settings {
    fn default() -> Self {
        Self {
            node_id: 1,
            encoder_counts_per_rev: 8192,
            homing_poll_limit: 100,
            command_timeout_ms: 500,
        }
    }
}

/// Convert deg/s to rpm.
pub fn deg_per_sec_to_rpm(velocity: f64) -> f64 {
    velocity / 6.0
}

/// Convert encoder counts to degrees.
pub fn counts_to_degrees(counts: i64, counts_per_rev: u32) -> f64 {
    if counts_per_rev == 0 {
        return 0.0;
    }
    counts as f64 * 360.0 / f64::from(counts_per_rev)
}

/// [`MotorActuator`] over a CiA-402 drive.
pub struct Cia402Drive<D: ObjectDictionary> {
    od: D,
    name: String,
    settings: Cia402Settings,
    connected: bool,
    moving: bool,
}

impl<D: ObjectDictionary> Cia402Drive<D> {
    /// Wrap a transport.
    pub fn new(od: D, settings: Cia402Settings) -> Self {
        let name = format!("cia402-node{}", settings.node_id);
        Self {
            od,
            name,
            settings,
            connected: false,
            moving: false,
        }
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &D {
        &self.od
    }

    fn command_error(&self, command: &'static str, error: OdError) -> ActuatorCommandError {
        match error {
            OdError::Timeout => {
                ActuatorCommandError::timeout(&self.name, self.settings.command_timeout_ms)
            }
            OdError::Abort { .. } => {
                ActuatorCommandError::rejected(&self.name, command, error.to_string())
            }
            OdError::Transport(message) => ActuatorCommandError::communication(&self.name, message),
        }
    }

    fn write(&mut self, command: &'static str, index: u16, value: i64) -> Result<(), ActuatorCommandError> {
        debug!(device = %self.name, command, index = format_args!("{index:#06x}"), value, "od write");
        self.od
            .write(index, 0, value)
            .map_err(|e| self.command_error(command, e))
    }

    fn read(&mut self, command: &'static str, index: u16) -> Result<i64, ActuatorCommandError> {
        self.od.read(index, 0).map_err(|e| self.command_error(command, e))
    }

    fn ensure_connected(&self) -> Result<(), ActuatorCommandError> {
        if self.connected {
            Ok(())
        } else {
            Err(ActuatorCommandError::not_connected(&self.name))
        }
    }

    fn enable_sequence(&mut self) -> Result<(), ActuatorCommandError> {
        self.write("connect", od::CONTROL_WORD, control::SHUTDOWN)?;
        self.write("connect", od::CONTROL_WORD, control::SWITCH_ON)?;
        self.write("connect", od::CONTROL_WORD, control::ENABLE_OPERATION)?;
        self.write("connect", od::MODE_OF_OPERATION, mode::PROFILE_VELOCITY)?;
        Ok(())
    }

    fn run_homing(&mut self) -> Result<(), ActuatorCommandError> {
        self.write("home", od::HOMING_METHOD, HOMING_ON_CURRENT_POSITION)?;
        self.write("home", od::CONTROL_WORD, control::START_HOMING)?;

        for poll in 0..self.settings.homing_poll_limit {
            let status = self.read("home", od::STATUS_WORD)?;
            if status & STATUS_HOMING_ERROR != 0 {
                return Err(ActuatorCommandError::rejected(
                    &self.name,
                    "home",
                    format!("drive reported homing error (status {status:#06x})"),
                ));
            }
            if status & STATUS_HOMING_ATTAINED != 0 {
                debug!(device = %self.name, polls = poll + 1, "homing attained");
                return Ok(());
            }
        }

        Err(ActuatorCommandError::timeout(
            &self.name,
            self.settings.command_timeout_ms,
        ))
    }
}

impl<D: ObjectDictionary> BenchDevice for Cia402Drive<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        if self.connected {
            return Ok(());
        }
        self.od
            .open()
            .map_err(|e| DeviceError::connection_failed(&self.name, e.to_string()))?;

        if let Err(error) = self.enable_sequence() {
            self.od.close();
            return Err(DeviceError::initialization_failed(&self.name, error.to_string()));
        }

        self.connected = true;
        self.moving = false;
        info!(device = %self.name, "drive enabled in profile velocity mode");
        Ok(())
    }

    fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        if let Err(error) = self.stop() {
            warn!(device = %self.name, %error, "stop before disconnect failed");
        }
        if let Err(error) = self.write("disconnect", od::CONTROL_WORD, control::DISABLE_VOLTAGE) {
            warn!(device = %self.name, %error, "disable voltage failed");
        }
        self.od.close();
        self.connected = false;
        self.moving = false;
        info!(device = %self.name, "drive disabled");
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl<D: ObjectDictionary> MotorActuator for Cia402Drive<D> {
    fn home(&mut self) -> Result<(), ActuatorCommandError> {
        self.ensure_connected()?;
        self.write("home", od::TARGET_VELOCITY, 0)?;
        self.write("home", od::MODE_OF_OPERATION, mode::HOMING)?;
        self.moving = false;

        let homed = self.run_homing();

        // Back to velocity mode even when homing failed.
        let restored = self
            .write("home", od::MODE_OF_OPERATION, mode::PROFILE_VELOCITY)
            .and_then(|()| self.write("home", od::CONTROL_WORD, control::ENABLE_OPERATION));

        homed?;
        restored?;
        info!(device = %self.name, "drive homed");
        Ok(())
    }

    fn move_continuous(&mut self, velocity: f64) -> Result<(), ActuatorCommandError> {
        self.ensure_connected()?;
        if !velocity.is_finite() {
            return Err(ActuatorCommandError::rejected(
                &self.name,
                "move_continuous",
                "velocity must be finite",
            ));
        }
        let rpm = deg_per_sec_to_rpm(velocity).round() as i64;
        self.write("move_continuous", od::TARGET_VELOCITY, rpm)?;
        self.write("move_continuous", od::CONTROL_WORD, control::ENABLE_OPERATION)?;
        self.moving = rpm != 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuatorCommandError> {
        self.ensure_connected()?;
        self.write("stop", od::TARGET_VELOCITY, 0)?;
        self.write("stop", od::CONTROL_WORD, control::QUICK_STOP)?;
        self.write("stop", od::CONTROL_WORD, control::ENABLE_OPERATION)?;
        self.moving = false;
        Ok(())
    }

    fn get_position(&mut self) -> Result<f64, ActuatorCommandError> {
        self.ensure_connected()?;
        let counts = self.read("get_position", od::POSITION_ACTUAL)?;
        Ok(counts_to_degrees(counts, self.settings.encoder_counts_per_rev))
    }

    fn is_moving(&self) -> bool {
        self.moving
    }
}

impl<D: ObjectDictionary> std::fmt::Debug for Cia402Drive<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cia402Drive")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("connected", &self.connected)
            .field("moving", &self.moving)
            .finish_non_exhaustive()
    }
}
