//! Convenience re-exports.

pub use crate::bundle::BenchHardware;
pub use crate::cia402::{Cia402Drive, Cia402Settings, ObjectDictionary, OdError};
pub use crate::clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use crate::scale::{LinearScale, normalize_angle};
pub use crate::simulated::{RigProbe, SimulatedBench};
pub use crate::traits::{AngleSensor, BenchDevice, MotorActuator, TorqueSensor};
