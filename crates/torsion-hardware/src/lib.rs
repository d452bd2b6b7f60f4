//! Hardware contracts and adapters for the torsion bench.
//!
//! The measurement core talks to three devices through the traits in
//! [`traits`]:
//!
//! - [`TorqueSensor`]: torque cell voltage with a software zero offset
//! - [`AngleSensor`]: single-turn absolute angle voltage plus its mapping
//! - [`MotorActuator`]: continuous rotation, stop, homing, position
//!
//! Every adapter is also a [`BenchDevice`], so activation can connect and
//! roll back devices uniformly.
//!
//! Two adapter families live here:
//!
//! - [`simulated`]: a deterministic bench for demo mode and tests
//! - [`cia402`]: a CiA-402 drive in profile velocity mode, driven through an
//!   [`ObjectDictionary`](cia402::ObjectDictionary) transport supplied by the
//!   caller
//!
//! DAQ board drivers and fieldbus transports are not part of this crate.
//!
//! # Example
//!
//! ```
//! use torsion_config::BenchConfig;
//! use torsion_hardware::prelude::*;
//!
//! let config = BenchConfig::demo();
//! let mut hw = SimulatedBench::new(&config, SystemClock::shared()).into_hardware();
//! hw.torque.connect().expect("simulated devices always connect");
//! let volts = hw.torque.read_voltage().expect("connected");
//! assert!(volts.abs() <= 10.0);
//! ```

#![deny(clippy::unwrap_used)]
#![warn(rust_2018_idioms)]

pub mod bundle;
pub mod cia402;
pub mod clock;
pub mod prelude;
pub mod scale;
pub mod simulated;
pub mod traits;

pub use bundle::BenchHardware;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use scale::LinearScale;
pub use simulated::SimulatedBench;
pub use traits::{AngleSensor, BenchDevice, MotorActuator, TorqueSensor};
