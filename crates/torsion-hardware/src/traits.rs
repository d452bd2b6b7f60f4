//! Device contracts consumed by the measurement core.

use crate::scale::LinearScale;
use torsion_errors::{ActuatorCommandError, DeviceError, SensorReadError};

/// Connection lifecycle shared by every bench device.
///
/// `connect` must leave the device either fully usable or fully closed.
/// `disconnect` never fails; adapters log and swallow transport errors
/// while closing, because the caller cannot do anything more useful.
pub trait BenchDevice: Send {
    /// Short device name used in logs and error reports.
    fn name(&self) -> &str;

    /// Open the device.
    ///
    /// # Errors
    ///
    /// Returns a [`DeviceError`] describing why the device is unusable.
    fn connect(&mut self) -> Result<(), DeviceError>;

    /// Close the device. Calling this on a closed device is a no-op.
    fn disconnect(&mut self);

    /// Whether the device is currently open.
    fn is_connected(&self) -> bool;
}

/// Torque cell channel.
pub trait TorqueSensor: BenchDevice {
    /// Read the current voltage with the zero offset applied.
    ///
    /// Implementations must return within their configured timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`SensorReadError`] on timeout, disconnect or an unusable
    /// reading.
    fn read_voltage(&mut self) -> Result<f64, SensorReadError>;

    /// Take the current load as the new zero.
    ///
    /// Calling this again under the same load leaves the offset unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`SensorReadError`] if the reference reading fails.
    fn calibrate_zero(&mut self) -> Result<(), SensorReadError>;
}

/// Single-turn absolute angle channel.
pub trait AngleSensor: BenchDevice {
    /// Read the current voltage.
    ///
    /// # Errors
    ///
    /// Returns a [`SensorReadError`] on timeout, disconnect or an unusable
    /// reading.
    fn read_voltage(&mut self) -> Result<f64, SensorReadError>;

    /// Voltage to degree mapping of this channel.
    fn scale(&self) -> &LinearScale;

    /// Read the voltage and convert it to a raw angle in [0, 360).
    ///
    /// Returns `(voltage, raw_angle)`.
    ///
    /// # Errors
    ///
    /// Propagates [`read_voltage`](Self::read_voltage) failures.
    fn read_raw_angle(&mut self) -> Result<(f64, f64), SensorReadError> {
        let voltage = self.read_voltage()?;
        Ok((voltage, self.scale().to_raw_angle(voltage)))
    }
}

/// Motor controller.
///
/// One implementation per vendor; the measurement core only sees this trait.
pub trait MotorActuator: BenchDevice {
    /// Drive to the physical zero reference. Blocks until the reference is
    /// reached or the controller gives up.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuatorCommandError`] if homing fails or times out.
    fn home(&mut self) -> Result<(), ActuatorCommandError>;

    /// Rotate continuously at `velocity` deg/s. The sign selects direction.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuatorCommandError`] if the command is not accepted.
    fn move_continuous(&mut self, velocity: f64) -> Result<(), ActuatorCommandError>;

    /// Halt motion.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuatorCommandError`] if the stop is not confirmed. The
    /// caller must treat the motor as possibly still moving.
    fn stop(&mut self) -> Result<(), ActuatorCommandError>;

    /// Multi-turn position in degrees.
    ///
    /// # Errors
    ///
    /// Returns an [`ActuatorCommandError`] if the position cannot be read.
    fn get_position(&mut self) -> Result<f64, ActuatorCommandError>;

    /// Whether the last accepted command left the motor moving.
    fn is_moving(&self) -> bool;
}
