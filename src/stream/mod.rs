//! Simulator output interpretation
//!
//! Line classification and the physical time calibration derived from the
//! output stream.

pub mod calibration;
pub mod classifier;

pub use calibration::{relative_time_from_units, Calibration, CalibrationConfig, RelativeTimeScanner};
pub use classifier::{classify, LineKind, DUMP_MARKER};
