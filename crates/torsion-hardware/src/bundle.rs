//! The three bench devices as one unit.

use torsion_errors::{ActivationError, DeviceFailure};
use tracing::{info, warn};

use crate::traits::{AngleSensor, BenchDevice, MotorActuator, TorqueSensor};

/// Torque sensor, angle sensor and motor of one bench.
pub struct BenchHardware {
    /// Torque cell channel
    pub torque: Box<dyn TorqueSensor>,
    /// Angle channel
    pub angle: Box<dyn AngleSensor>,
    /// Motor controller
    pub motor: Box<dyn MotorActuator>,
}

impl BenchHardware {
    /// Bundle three devices.
    pub fn new(
        torque: Box<dyn TorqueSensor>,
        angle: Box<dyn AngleSensor>,
        motor: Box<dyn MotorActuator>,
    ) -> Self {
        Self {
            torque,
            angle,
            motor,
        }
    }

    /// Connect torque sensor, angle sensor and motor, in that order.
    ///
    /// Every device is attempted even after a failure so the error names all
    /// of them. On any failure the devices that did connect are disconnected
    /// again before returning.
    ///
    /// # Errors
    ///
    /// Returns an [`ActivationError`] listing each failed device and its cause.
    pub fn connect_all(&mut self) -> Result<(), ActivationError> {
        let mut failures = Vec::new();
        let mut connected = [false; 3];

        for (slot, device) in self.devices_mut().into_iter().enumerate() {
            match device.connect() {
                Ok(()) => {
                    info!(device = device.name(), "device connected");
                    if let Some(flag) = connected.get_mut(slot) {
                        *flag = true;
                    }
                }
                Err(error) => {
                    warn!(device = device.name(), %error, "device failed to connect");
                    failures.push(DeviceFailure::new(device.name(), error));
                }
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        // Roll back in reverse order.
        for (slot, device) in self.devices_mut().into_iter().enumerate().rev() {
            if connected.get(slot).copied().unwrap_or(false) {
                device.disconnect();
                info!(device = device.name(), "rolled back connection");
            }
        }

        Err(ActivationError::new(failures))
    }

    /// Disconnect motor, angle sensor and torque sensor, in that order.
    pub fn disconnect_all(&mut self) {
        for device in self.devices_mut().into_iter().rev() {
            if device.is_connected() {
                device.disconnect();
                info!(device = device.name(), "device disconnected");
            }
        }
    }

    /// Whether every device reports connected.
    pub fn all_connected(&self) -> bool {
        self.torque.is_connected() && self.angle.is_connected() && self.motor.is_connected()
    }

    fn devices_mut(&mut self) -> [&mut dyn BenchDevice; 3] {
        [
            self.torque.as_mut() as &mut dyn BenchDevice,
            self.angle.as_mut() as &mut dyn BenchDevice,
            self.motor.as_mut() as &mut dyn BenchDevice,
        ]
    }
}

impl std::fmt::Debug for BenchHardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchHardware")
            .field("torque", &self.torque.name())
            .field("angle", &self.angle.name())
            .field("motor", &self.motor.name())
            .finish()
    }
}
