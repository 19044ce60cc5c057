//! Strategy selection
//!
//! The configured strategy name is looked up once in an explicit registry and
//! turned into a [`Detector`], a closed enum over the three conditions.

use crate::analysis::chunk_mean::{ChunkMeanCondition, ChunkMeanParams};
use crate::analysis::mean_difference::MeanDifferenceCondition;
use crate::analysis::slope::{SlopeCondition, WindowedParams};
use crate::analysis::types::Verdict;
use crate::analysis::ConvergenceCondition;
use crate::errors::{Result, RunError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Convergence configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceParams {
    /// Stop automatically on convergence
    pub enabled: bool,

    /// Registry key of the strategy
    pub strategy: String,

    pub chunk_mean: ChunkMeanParams,

    pub windowed: WindowedParams,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: "chunk_mean".to_string(),
            chunk_mean: ChunkMeanParams::default(),
            windowed: WindowedParams::default(),
        }
    }
}

/// Builds a detector from configuration and the simulator time step
pub type DetectorConstructor = fn(&ConvergenceParams, f64) -> Result<Detector>;

/// One of the available convergence conditions
pub enum Detector {
    ChunkMean(ChunkMeanCondition),
    Slope(SlopeCondition),
    MeanDifference(MeanDifferenceCondition),
}

impl Detector {
    fn inner(&self) -> &dyn ConvergenceCondition {
        match self {
            Detector::ChunkMean(c) => c,
            Detector::Slope(c) => c,
            Detector::MeanDifference(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ConvergenceCondition {
        match self {
            Detector::ChunkMean(c) => c,
            Detector::Slope(c) => c,
            Detector::MeanDifference(c) => c,
        }
    }
}

impl ConvergenceCondition for Detector {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn feed(&mut self, sample: f64) -> Verdict {
        self.inner_mut().feed(sample)
    }

    fn samples_seen(&self) -> u64 {
        self.inner().samples_seen()
    }
}

fn build_chunk_mean(params: &ConvergenceParams, _time_step: f64) -> Result<Detector> {
    ChunkMeanCondition::new(params.chunk_mean.clone()).map(Detector::ChunkMean)
}

fn build_slope(params: &ConvergenceParams, time_step: f64) -> Result<Detector> {
    SlopeCondition::new(&params.windowed, time_step).map(Detector::Slope)
}

fn build_mean_difference(params: &ConvergenceParams, time_step: f64) -> Result<Detector> {
    MeanDifferenceCondition::new(&params.windowed, time_step).map(Detector::MeanDifference)
}

/// All known strategies by configuration name
pub fn registry() -> BTreeMap<&'static str, DetectorConstructor> {
    let mut map: BTreeMap<&'static str, DetectorConstructor> = BTreeMap::new();
    map.insert("chunk_mean", build_chunk_mean);
    map.insert("slope", build_slope);
    map.insert("mean_difference", build_mean_difference);
    map
}

/// Construct the configured detector
///
/// Returns `Ok(None)` when automatic stopping is disabled.
pub fn build_detector(params: &ConvergenceParams, time_step: f64) -> Result<Option<Detector>> {
    if !params.enabled {
        return Ok(None);
    }
    let registry = registry();
    let constructor = registry.get(params.strategy.as_str()).ok_or_else(|| {
        RunError::InvalidStrategy {
            name: params.strategy.clone(),
            known: registry.keys().copied().collect::<Vec<_>>().join(", "),
        }
    })?;
    constructor(params, time_step).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        let names: Vec<&str> = registry().keys().copied().collect();
        assert_eq!(names, vec!["chunk_mean", "mean_difference", "slope"]);
    }

    #[test]
    fn test_build_each_strategy() {
        for name in ["chunk_mean", "slope", "mean_difference"] {
            let params = ConvergenceParams {
                strategy: name.to_string(),
                ..Default::default()
            };
            let detector = build_detector(&params, 1e-3).unwrap().unwrap();
            assert_eq!(detector.name(), name);
        }
    }

    #[test]
    fn test_unknown_strategy() {
        let params = ConvergenceParams {
            strategy: "median".to_string(),
            ..Default::default()
        };
        match build_detector(&params, 1e-3) {
            Err(RunError::InvalidStrategy { name, known }) => {
                assert_eq!(name, "median");
                assert!(known.contains("slope"));
            }
            _ => panic!("expected InvalidStrategy"),
        }
    }

    #[test]
    fn test_disabled_builds_nothing() {
        let params = ConvergenceParams {
            enabled: false,
            ..Default::default()
        };
        assert!(build_detector(&params, 1e-3).unwrap().is_none());
    }

    #[test]
    fn test_misconfiguration_fails_at_construction() {
        let mut params = ConvergenceParams {
            strategy: "slope".to_string(),
            ..Default::default()
        };
        params.windowed.small_step_multiplier = params.windowed.big_step_multiplier;
        assert!(matches!(
            build_detector(&params, 1e-3),
            Err(RunError::Misconfigured(_))
        ));
    }
}
