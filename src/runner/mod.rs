//! Run driver and its collaborators

pub mod driver;
pub mod interrupt;
pub mod launch;
pub mod sink;

pub use driver::{RunDriver, RunReport, StageInfo, StopReason};
pub use interrupt::InterruptFlag;
pub use launch::{launch, LaunchOptions};
pub use sink::{stage_suffix, LineSink};
