//! Dual-timescale mean-difference condition with adaptive strides
//!
//! On every swap the pair checks
//!
//! ```text
//! |next.mean - current.mean| < scale * precision
//! ```
//!
//! where `scale` is the spread of every chunk mean seen so far (1 while no
//! spread exists). Each timescale keeps its own "satisfied" flag and the run
//! is steady only while **both** hold. Past sample 2000 the strides grow with
//! the run so late noise keeps averaging out.

use crate::analysis::chunk::WindowPair;
use crate::analysis::slope::WindowedParams;
use crate::analysis::strides::StridePlan;
use crate::analysis::types::{Timescale, Verdict, WindowComparison};
use crate::analysis::ConvergenceCondition;
use crate::errors::Result;
use tracing::{debug, info};

/// Stops once both timescales agree on a stable mean
pub struct MeanDifferenceCondition {
    precision: f64,
    plan: StridePlan,
    pairs: [WindowPair; 2],
    extremes: Option<(f64, f64)>,
    satisfied: [bool; 2],
    rescales: u64,
    index: u64,
}

impl MeanDifferenceCondition {
    pub fn new(params: &WindowedParams, time_step: f64) -> Result<Self> {
        let plan = params.plan(time_step)?;
        Ok(Self {
            precision: params.precision,
            pairs: params.pairs(&plan),
            plan,
            extremes: None,
            satisfied: [false, false],
            rescales: 0,
            index: 0,
        })
    }

    pub fn plan(&self) -> &StridePlan {
        &self.plan
    }

    /// Strides currently held by the small and big pairs
    pub fn steps(&self) -> (f64, f64) {
        (self.pairs[0].step(), self.pairs[1].step())
    }

    /// Number of adaptive rescale events so far
    pub fn rescales(&self) -> u64 {
        self.rescales
    }

    pub fn is_satisfied(&self, timescale: Timescale) -> bool {
        match timescale {
            Timescale::Small => self.satisfied[0],
            Timescale::Big => self.satisfied[1],
        }
    }

    /// Spread of observed means, `None` until one exists
    pub fn scale(&self) -> Option<f64> {
        self.extremes
            .map(|(min, max)| (max - min).abs())
            .filter(|scale| *scale > 0.0)
    }

    /// Allowed mean difference
    pub fn deviation(&self) -> f64 {
        match self.scale() {
            Some(scale) => scale * self.precision,
            None => self.precision,
        }
    }

    fn observe(&mut self, value: f64) {
        self.extremes = Some(match self.extremes {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }

    fn judge(&mut self, slot: usize, comparison: WindowComparison) {
        self.observe(comparison.current.mean);
        self.observe(comparison.next.mean);

        let difference = comparison.mean_difference().abs();
        let deviation = self.deviation();
        self.satisfied[slot] = difference < deviation;
        debug!(
            timescale = comparison.timescale.as_str(),
            difference,
            deviation,
            satisfied = self.satisfied[slot],
            "window means compared"
        );
    }
}

impl ConvergenceCondition for MeanDifferenceCondition {
    fn name(&self) -> &'static str {
        "mean_difference"
    }

    fn feed(&mut self, sample: f64) -> Verdict {
        let index = self.index;
        self.index += 1;

        if self.extremes.is_none() {
            self.observe(sample);
        }

        if self.plan.rescale(index) {
            self.pairs[0].set_step(self.plan.small());
            self.pairs[1].set_step(self.plan.big());
            self.rescales += 1;
            debug!(index, small = self.plan.small(), big = self.plan.big(), "strides rescaled");
        }

        let comparisons = [
            self.pairs[0].push(index, sample),
            self.pairs[1].push(index, sample),
        ];
        for (slot, comparison) in comparisons.into_iter().enumerate() {
            if let Some(comparison) = comparison {
                self.judge(slot, comparison);
            }
        }

        if self.satisfied.iter().all(|s| *s) {
            info!(index, deviation = self.deviation(), "window means settled on both timescales");
            return Verdict::Stop;
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

    fn params() -> WindowedParams {
        WindowedParams {
            precision: 1e-3,
            chunk_size: 10,
            big_step_multiplier: 10.0,
            small_step_multiplier: 0.0,
            low_step_border: 10.0,
            high_step_border: 1e6,
        }
    }

    #[test]
    fn test_default_deviation_without_spread() {
        let mut cond = MeanDifferenceCondition::new(&params(), 1e-3).unwrap();
        cond.feed(4.0);
        assert!(cond.scale().is_none());
        assert_eq!(cond.deviation(), 1e-3);
    }

    #[test]
    fn test_needs_both_timescales() {
        let mut cond = MeanDifferenceCondition::new(&params(), 1e-3).unwrap();
        // small: [0,10) then [25,35); big: [0,10) then [40,50)
        let mut stop_at = None;
        for i in 0..200u64 {
            if cond.feed(1.0).should_stop() {
                stop_at = Some(i);
                break;
            }
            if i == 34 {
                assert!(cond.is_satisfied(Timescale::Small));
                assert!(!cond.is_satisfied(Timescale::Big));
            }
        }
        assert_eq!(stop_at, Some(49));
    }

    #[test]
    fn test_flag_clears_when_means_diverge() {
        let mut cond = MeanDifferenceCondition::new(&params(), 1e-3).unwrap();
        for _ in 0..35 {
            cond.feed(1.0);
        }
        assert!(cond.is_satisfied(Timescale::Small));
        // next small window [50,60) sees a jump
        for _ in 35..60 {
            cond.feed(5.0);
        }
        assert!(!cond.is_satisfied(Timescale::Small));
        assert!(cond.scale().unwrap() > 3.9);
    }

    #[test]
    fn test_rescale_keeps_ratio() {
        let mut cond = MeanDifferenceCondition::new(&params(), 1e-3).unwrap();
        let ratio = cond.plan().ratio();
        let mut seen_rescales = 0;
        for i in 0..20_000u64 {
            assert_eq!(cond.feed(i as f64), Verdict::Continue);
            if cond.rescales() != seen_rescales {
                seen_rescales = cond.rescales();
                let (small, big) = cond.steps();
                assert!((big / small - ratio).abs() < 1e-9);
                assert!(big >= (i as f64 / 30.0).min(1e6) - 1e-9);
            }
        }
        assert!(seen_rescales > 0);
    }
}
