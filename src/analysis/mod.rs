//! Streaming convergence detection
//!
//! Online conditions that decide, sample by sample and without lookahead,
//! when a simulated transient has reached steady state. All of them run in
//! constant space over an unbounded stream.

pub mod chunk;
pub mod chunk_mean;
pub mod mean_difference;
pub mod registry;
pub mod slope;
pub mod strides;
pub mod types;

pub use chunk::{Chunk, WindowPair};
pub use chunk_mean::{ChunkMeanCondition, ChunkMeanParams};
pub use mean_difference::MeanDifferenceCondition;
pub use registry::{build_detector, registry, ConvergenceParams, Detector};
pub use slope::{SlopeCondition, WindowedParams};
pub use strides::StridePlan;
pub use types::{Timescale, Verdict, WindowComparison};

/// A convergence condition fed one sample at a time
pub trait ConvergenceCondition {
    /// Registry name of the condition
    fn name(&self) -> &'static str;

    /// Consume the next sample in stream order
    fn feed(&mut self, sample: f64) -> Verdict;

    /// Samples consumed so far
    fn samples_seen(&self) -> u64;
}
