//! Shared test utilities for the torsion bench.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with good error messages and `#[track_caller]`
//! - [`assertions`] - Float and collection assertion macros
//! - [`mock`] - Scripted sensors, a recording motor and in-memory sinks
//! - [`fixtures`] - Configurations and mock benches for common scenarios
//! - [`prelude`] - Convenience re-exports
//!
//! Add to a crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! torsion-test-helpers = { workspace = true }
//! ```
//!
//! Then import the prelude:
//!
//! ```rust,ignore
//! use torsion_test_helpers::prelude::*;
//! ```

#![allow(clippy::unwrap_used, clippy::panic)]

pub mod assertions;
pub mod fixtures;
pub mod mock;
pub mod must;
pub mod prelude;

pub use must::*;
