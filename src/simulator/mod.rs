//! External simulator access: its process output and its parameter file

pub mod params;
pub mod process;

pub use params::{ParameterFile, ILLUMINATION_VAR, TIME_STEP_VAR};
pub use process::{LineSource, SimulatorLocation, SimulatorProcess, Termination};
