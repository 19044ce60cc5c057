//! Dual-timescale slope condition
//!
//! Two window pairs (small and big stride) run side by side. Every swap yields
//! two points `(x, mean * 1e3)`; the run is steady as soon as the line through
//! them is flatter than `precision` on **either** timescale.

use crate::analysis::chunk::WindowPair;
use crate::analysis::strides::StridePlan;
use crate::analysis::types::{Timescale, Verdict};
use crate::analysis::ConvergenceCondition;
use crate::errors::{Result, RunError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Means are scaled before the slope is taken so small currents stay above
/// floating noise
pub const SLOPE_Y_SCALE: f64 = 1e3;

/// Parameters shared by both dual-timescale conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowedParams {
    /// Threshold on slope or relative mean difference
    pub precision: f64,

    /// Samples per chunk
    pub chunk_size: usize,

    /// Big stride multiplier of `|log10(time_step)|`
    pub big_step_multiplier: f64,

    /// Small stride multiplier, 0 derives the small stride with ratio 2
    pub small_step_multiplier: f64,

    /// Lowest allowed small stride
    pub low_step_border: f64,

    /// Highest allowed big stride
    pub high_step_border: f64,
}

impl Default for WindowedParams {
    fn default() -> Self {
        Self {
            precision: 2e-5,
            chunk_size: 100,
            big_step_multiplier: 1000.0,
            small_step_multiplier: 0.0,
            low_step_border: 500.0,
            high_step_border: 1e6,
        }
    }
}

impl WindowedParams {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RunError::Misconfigured(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if !(self.precision.is_finite() && self.precision > 0.0) {
            return Err(RunError::Misconfigured(format!(
                "precision must be positive, got {}",
                self.precision
            )));
        }
        Ok(())
    }

    /// Validate and derive the stride plan for a simulator time step
    pub fn plan(&self, time_step: f64) -> Result<StridePlan> {
        self.validate()?;
        StridePlan::derive(
            time_step,
            self.big_step_multiplier,
            self.small_step_multiplier,
            self.low_step_border,
            self.high_step_border,
        )
    }

    pub(crate) fn pairs(&self, plan: &StridePlan) -> [WindowPair; 2] {
        [
            WindowPair::new(Timescale::Small, self.chunk_size, plan.small()),
            WindowPair::new(Timescale::Big, self.chunk_size, plan.big()),
        ]
    }
}

/// Stops on the first flat slope at any timescale
pub struct SlopeCondition {
    precision: f64,
    plan: StridePlan,
    pairs: [WindowPair; 2],
    last_slopes: [Option<f64>; 2],
    index: u64,
}

impl SlopeCondition {
    pub fn new(params: &WindowedParams, time_step: f64) -> Result<Self> {
        let plan = params.plan(time_step)?;
        Ok(Self {
            precision: params.precision,
            pairs: params.pairs(&plan),
            plan,
            last_slopes: [None, None],
            index: 0,
        })
    }

    pub fn plan(&self) -> &StridePlan {
        &self.plan
    }

    /// Most recent slope on a timescale
    pub fn last_slope(&self, timescale: Timescale) -> Option<f64> {
        match timescale {
            Timescale::Small => self.last_slopes[0],
            Timescale::Big => self.last_slopes[1],
        }
    }
}

impl ConvergenceCondition for SlopeCondition {
    fn name(&self) -> &'static str {
        "slope"
    }

    fn feed(&mut self, sample: f64) -> Verdict {
        let index = self.index;
        self.index += 1;

        for (slot, pair) in self.pairs.iter_mut().enumerate() {
            let Some(comparison) = pair.push(index, sample) else {
                continue;
            };
            let k = comparison.slope(SLOPE_Y_SCALE);
            self.last_slopes[slot] = Some(k);
            debug!(
                timescale = comparison.timescale.as_str(),
                index,
                slope = k,
                "window slope"
            );
            if k.abs() < self.precision {
                info!(
                    timescale = comparison.timescale.as_str(),
                    index,
                    slope = k,
                    "slope flattened"
                );
                return Verdict::Stop;
            }
        }
        Verdict::Continue
    }

    fn samples_seen(&self) -> u64 {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(precision: f64) -> WindowedParams {
        WindowedParams {
            precision,
            chunk_size: 10,
            big_step_multiplier: 10.0,
            small_step_multiplier: 0.0,
            low_step_border: 5.0,
            high_step_border: 1e6,
        }
    }

    #[test]
    fn test_plan_from_time_step() {
        let cond = SlopeCondition::new(&params(1e-2), 1e-3).unwrap();
        assert!((cond.plan().big() - 30.0).abs() < 1e-9);
        assert!((cond.plan().small() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_stream_stops_on_first_small_swap() {
        let mut cond = SlopeCondition::new(&params(1e-2), 1e-3).unwrap();
        // small pair: current [0,10), next [25,35)
        let mut stop_at = None;
        for i in 0..100u64 {
            if cond.feed(0.5).should_stop() {
                stop_at = Some(i);
                break;
            }
        }
        assert_eq!(stop_at, Some(34));
        assert_eq!(cond.last_slope(Timescale::Small), Some(0.0));
    }

    #[test]
    fn test_ramp_never_stops() {
        let mut cond = SlopeCondition::new(&params(1e-2), 1e-3).unwrap();
        for i in 0..20_000u64 {
            assert_eq!(cond.feed(1e-3 * i as f64), Verdict::Continue);
        }
        let k = cond.last_slope(Timescale::Big).unwrap();
        assert!((k - 1.0).abs() < 1e-6, "slope was {}", k);
    }

    #[test]
    fn test_rejects_zero_precision() {
        assert!(SlopeCondition::new(&params(0.0), 1e-3).is_err());
    }
}
