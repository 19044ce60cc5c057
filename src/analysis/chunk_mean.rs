//! Simple chunk-mean stability condition
//!
//! Samples fill one chunk; every completed fill pushes the chunk mean into a
//! rolling history of `equal_values_to_stop` means. Once the history is full
//! the run is steady when
//!
//! ```text
//! ptp(history) < 2 * max(|history|) * deviation_coef
//!   or
//! max(|history|) < NULL_THRESHOLD
//! ```

use crate::analysis::chunk::Chunk;
use crate::analysis::types::Verdict;
use crate::analysis::ConvergenceCondition;
use crate::errors::{Result, RunError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Means below this magnitude count as converged to zero
pub const NULL_THRESHOLD: f64 = 1e-10;

/// Chunk-mean condition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMeanParams {
    /// Samples per chunk
    pub chunk_size: usize,

    /// History length of chunk means that must agree
    pub equal_values_to_stop: usize,

    /// Allowed relative deviation of the means
    pub deviation_coef: f64,
}

impl Default for ChunkMeanParams {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            equal_values_to_stop: 100,
            deviation_coef: 1e-5,
        }
    }
}

impl ChunkMeanParams {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RunError::Misconfigured(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.equal_values_to_stop < 2 {
            return Err(RunError::Misconfigured(format!(
                "equal_values_to_stop must be at least 2, got {}",
                self.equal_values_to_stop
            )));
        }
        if !(self.deviation_coef.is_finite() && self.deviation_coef >= 0.0) {
            return Err(RunError::Misconfigured(format!(
                "deviation_coef must be a non-negative number, got {}",
                self.deviation_coef
            )));
        }
        Ok(())
    }
}

/// Rolling history of chunk means
pub struct ChunkMeanCondition {
    params: ChunkMeanParams,
    chunk: Chunk,
    history: VecDeque<f64>,
    samples: u64,
}

impl ChunkMeanCondition {
    pub fn new(params: ChunkMeanParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            chunk: Chunk::new(0, params.chunk_size),
            history: VecDeque::with_capacity(params.equal_values_to_stop),
            params,
            samples: 0,
        })
    }

    pub fn params(&self) -> &ChunkMeanParams {
        &self.params
    }

    /// Chunk means currently held
    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    /// Check whether all means lie within the tolerance band
    pub fn is_settled(history: &VecDeque<f64>, deviation_coef: f64) -> bool {
        let max_abs = history.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let max = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = history.iter().copied().fold(f64::INFINITY, f64::min);
        let deviation = max_abs * deviation_coef;

        if max - min < 2.0 * deviation {
            debug!(peak_to_peak = max - min, band = 2.0 * deviation, "chunk means settled");
            return true;
        }
        if max_abs < NULL_THRESHOLD {
            info!("Stopped by null condition");
            return true;
        }
        false
    }
}

impl ConvergenceCondition for ChunkMeanCondition {
    fn name(&self) -> &'static str {
        "chunk_mean"
    }

    fn feed(&mut self, sample: f64) -> Verdict {
        self.samples += 1;
        if !self.chunk.append(sample) {
            return Verdict::Continue;
        }
        let Some(mean) = self.chunk.mean() else {
            return Verdict::Continue;
        };

        self.history.push_back(mean);
        if self.history.len() < self.params.equal_values_to_stop {
            return Verdict::Continue;
        }

        if Self::is_settled(&self.history, self.params.deviation_coef) {
            return Verdict::Stop;
        }
        self.history.pop_front();
        Verdict::Continue
    }

    fn samples_seen(&self) -> u64 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(chunk_size: usize, equal: usize, coef: f64) -> ChunkMeanCondition {
        ChunkMeanCondition::new(ChunkMeanParams {
            chunk_size,
            equal_values_to_stop: equal,
            deviation_coef: coef,
        })
        .unwrap()
    }

    #[test]
    fn test_constant_stream_stops_on_last_chunk() {
        let mut cond = condition(100, 5, 1e-5);
        for i in 1..500 {
            assert_eq!(cond.feed(2.0), Verdict::Continue, "stopped early at sample {}", i);
        }
        assert_eq!(cond.feed(2.0), Verdict::Stop);
        assert_eq!(cond.samples_seen(), 500);
    }

    #[test]
    fn test_null_stream_stops_regardless_of_coef() {
        let mut cond = condition(10, 3, 0.0);
        let verdicts: Vec<Verdict> = (0..30).map(|_| cond.feed(1e-12)).collect();
        assert_eq!(verdicts.last(), Some(&Verdict::Stop));
        assert!(verdicts[..29].iter().all(|v| *v == Verdict::Continue));
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut cond = condition(1, 3, 1e-3);
        for v in [10.0, 20.0, 30.0] {
            assert_eq!(cond.feed(v), Verdict::Continue);
        }
        assert_eq!(cond.history().len(), 2);
        assert_eq!(cond.history().front(), Some(&20.0));

        // 30, 30, 30 settles only once the 20 has rolled out
        assert_eq!(cond.feed(30.0), Verdict::Continue);
        assert_eq!(cond.feed(30.0), Verdict::Stop);
    }

    #[test]
    fn test_drifting_stream_continues() {
        let mut cond = condition(10, 4, 1e-5);
        for i in 0..1000 {
            assert_eq!(cond.feed(1.0 + i as f64 * 0.01), Verdict::Continue);
        }
    }

    #[test]
    fn test_rejects_short_history() {
        let result = ChunkMeanCondition::new(ChunkMeanParams {
            chunk_size: 10,
            equal_values_to_stop: 1,
            deviation_coef: 1e-5,
        });
        assert!(matches!(result, Err(RunError::Misconfigured(_))));
    }

    #[test]
    fn test_rejects_empty_chunk() {
        let params = ChunkMeanParams {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
