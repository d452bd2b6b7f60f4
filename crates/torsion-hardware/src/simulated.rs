//! Simulated torsion bench for demo mode and tests.
//!
//! The three devices share one rig: the motor turns the fixture, the angle
//! sensor reports the shaft position within one turn, and the torque cell
//! reports a linear-elastic specimen response plus seeded noise.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use torsion_config::BenchConfig;
use torsion_errors::{ActuatorCommandError, DeviceError, SensorReadError};
use tracing::{debug, info};

use crate::bundle::BenchHardware;
use crate::clock::SharedClock;
use crate::scale::LinearScale;
use crate::traits::{AngleSensor, BenchDevice, MotorActuator, TorqueSensor};

const TORQUE_NAME: &str = "sim-torque";
const ANGLE_NAME: &str = "sim-angle";
const MOTOR_NAME: &str = "sim-motor";

#[derive(Debug)]
struct RigState {
    anchor_position: f64,
    anchor_time: Instant,
    velocity: f64,
    torque_offset: f64,
    rng: StdRng,
}

impl RigState {
    fn position_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.anchor_time).as_secs_f64();
        self.anchor_position + self.velocity * elapsed
    }

    /// Fold the motion so far into the anchor and switch to a new velocity.
    fn set_velocity(&mut self, velocity: f64, now: Instant) {
        self.anchor_position = self.position_at(now);
        self.anchor_time = now;
        self.velocity = velocity;
    }
}

#[derive(Debug, Clone)]
struct Specimen {
    stiffness_nm_per_deg: f64,
    noise_nm: f64,
    rated_torque_nm: f64,
}

/// Read-only view of the simulated rig, for tests and the CLI.
#[derive(Clone)]
pub struct RigProbe {
    rig: Arc<Mutex<RigState>>,
    clock: SharedClock,
}

impl RigProbe {
    /// Multi-turn shaft position in degrees.
    pub fn position(&self) -> f64 {
        self.rig.lock().position_at(self.clock.now())
    }

    /// Commanded velocity in deg/s; zero when stopped.
    pub fn velocity(&self) -> f64 {
        self.rig.lock().velocity
    }

    /// Current torque zero offset in Nm.
    pub fn torque_offset(&self) -> f64 {
        self.rig.lock().torque_offset
    }
}

impl std::fmt::Debug for RigProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigProbe").finish_non_exhaustive()
    }
}

/// Builder for the three simulated devices.
pub struct SimulatedBench {
    torque: SimTorqueSensor,
    angle: SimAngleSensor,
    motor: SimMotor,
    probe: RigProbe,
}

impl SimulatedBench {
    /// Build a simulated bench from the channel and simulation settings.
    pub fn new(config: &BenchConfig, clock: SharedClock) -> Self {
        let rig = Arc::new(Mutex::new(RigState {
            anchor_position: 0.0,
            anchor_time: clock.now(),
            velocity: 0.0,
            torque_offset: 0.0,
            rng: StdRng::seed_from_u64(config.simulation.seed),
        }));
        let specimen = Specimen {
            stiffness_nm_per_deg: config.simulation.stiffness_nm_per_deg,
            noise_nm: config.simulation.noise_nm,
            rated_torque_nm: config.torque_channel.rated_torque_nm,
        };

        Self {
            torque: SimTorqueSensor {
                rig: rig.clone(),
                clock: clock.clone(),
                specimen,
                scale: LinearScale::for_torque(&config.torque_channel),
                volts_per_nm: 1.0 / config.torque_channel.scale_nm_per_volt,
                connected: false,
            },
            angle: SimAngleSensor {
                rig: rig.clone(),
                clock: clock.clone(),
                scale: LinearScale::for_angle(&config.angle_channel),
                connected: false,
            },
            motor: SimMotor {
                rig: rig.clone(),
                clock: clock.clone(),
                connected: false,
            },
            probe: RigProbe { rig, clock },
        }
    }

    /// Probe onto the shared rig state.
    pub fn probe(&self) -> RigProbe {
        self.probe.clone()
    }

    /// Hand the devices over as a hardware bundle.
    pub fn into_hardware(self) -> BenchHardware {
        BenchHardware::new(
            Box::new(self.torque),
            Box::new(self.angle),
            Box::new(self.motor),
        )
    }
}

impl std::fmt::Debug for SimulatedBench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBench").finish_non_exhaustive()
    }
}

struct SimTorqueSensor {
    rig: Arc<Mutex<RigState>>,
    clock: SharedClock,
    specimen: Specimen,
    scale: LinearScale,
    volts_per_nm: f64,
    connected: bool,
}

impl SimTorqueSensor {
    fn elastic_torque(&self, rig: &RigState) -> f64 {
        self.specimen.stiffness_nm_per_deg * rig.position_at(self.clock.now())
    }
}

impl BenchDevice for SimTorqueSensor {
    fn name(&self) -> &str {
        TORQUE_NAME
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        self.connected = true;
        debug!(device = TORQUE_NAME, "connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl TorqueSensor for SimTorqueSensor {
    fn read_voltage(&mut self) -> Result<f64, SensorReadError> {
        if !self.connected {
            return Err(SensorReadError::disconnected(TORQUE_NAME));
        }
        let mut rig = self.rig.lock();
        let noise = if self.specimen.noise_nm > 0.0 {
            rig.rng
                .random_range(-self.specimen.noise_nm..=self.specimen.noise_nm)
        } else {
            0.0
        };
        let rated = self.specimen.rated_torque_nm;
        let torque = (self.elastic_torque(&rig) + noise + rig.torque_offset).clamp(-rated, rated);
        let voltage = torque * self.volts_per_nm;
        Ok(voltage.clamp(self.scale.voltage_min, self.scale.voltage_max))
    }

    fn calibrate_zero(&mut self) -> Result<(), SensorReadError> {
        if !self.connected {
            return Err(SensorReadError::disconnected(TORQUE_NAME));
        }
        let mut rig = self.rig.lock();
        rig.torque_offset = -self.elastic_torque(&rig);
        info!(offset_nm = rig.torque_offset, "torque zero calibrated");
        Ok(())
    }
}

struct SimAngleSensor {
    rig: Arc<Mutex<RigState>>,
    clock: SharedClock,
    scale: LinearScale,
    connected: bool,
}

impl BenchDevice for SimAngleSensor {
    fn name(&self) -> &str {
        ANGLE_NAME
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        self.connected = true;
        debug!(device = ANGLE_NAME, "connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl AngleSensor for SimAngleSensor {
    fn read_voltage(&mut self) -> Result<f64, SensorReadError> {
        if !self.connected {
            return Err(SensorReadError::disconnected(ANGLE_NAME));
        }
        let position = self.rig.lock().position_at(self.clock.now());
        Ok(self.scale.angle_to_voltage(position))
    }

    fn scale(&self) -> &LinearScale {
        &self.scale
    }
}

struct SimMotor {
    rig: Arc<Mutex<RigState>>,
    clock: SharedClock,
    connected: bool,
}

impl SimMotor {
    fn ensure_connected(&self) -> Result<(), ActuatorCommandError> {
        if self.connected {
            Ok(())
        } else {
            Err(ActuatorCommandError::not_connected(MOTOR_NAME))
        }
    }
}

impl BenchDevice for SimMotor {
    fn name(&self) -> &str {
        MOTOR_NAME
    }

    fn connect(&mut self) -> Result<(), DeviceError> {
        self.connected = true;
        debug!(device = MOTOR_NAME, "connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.rig.lock().set_velocity(0.0, self.clock.now());
        }
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl MotorActuator for SimMotor {
    fn home(&mut self) -> Result<(), ActuatorCommandError> {
        self.ensure_connected()?;
        let now = self.clock.now();
        let mut rig = self.rig.lock();
        rig.velocity = 0.0;
        rig.anchor_position = 0.0;
        rig.anchor_time = now;
        info!("simulated motor homed");
        Ok(())
    }

    fn move_continuous(&mut self, velocity: f64) -> Result<(), ActuatorCommandError> {
        self.ensure_connected()?;
        if !velocity.is_finite() {
            return Err(ActuatorCommandError::rejected(
                MOTOR_NAME,
                "move_continuous",
                "velocity must be finite",
            ));
        }
        self.rig.lock().set_velocity(velocity, self.clock.now());
        debug!(velocity, "simulated motor moving");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuatorCommandError> {
        self.ensure_connected()?;
        self.rig.lock().set_velocity(0.0, self.clock.now());
        Ok(())
    }

    fn get_position(&mut self) -> Result<f64, ActuatorCommandError> {
        self.ensure_connected()?;
        Ok(self.rig.lock().position_at(self.clock.now()))
    }

    fn is_moving(&self) -> bool {
        self.rig.lock().velocity != 0.0
    }
}
