//! steadyrun - convergence-driven runner for transient device simulators
//!
//! Reads a simulator's output line by line and stops it as soon as the
//! monitored quantity reaches steady state, a fixed impulse duration has
//! elapsed, or the user interrupts.
//!
//! # Architecture
//!
//! - **analysis**: streaming convergence conditions
//! - **stream**: output line classification and time calibration
//! - **cutoff** / **snapshot**: fixed-duration stop and distribution archiving
//! - **runner**: the I/O loop tying it together

pub mod analysis;
pub mod cli;
pub mod cutoff;
pub mod errors;
pub mod runner;
pub mod simulator;
pub mod snapshot;
pub mod stream;
pub mod telemetry;

// Re-export commonly used types
pub use errors::{Result, RunError};
