//! Stride planning for the dual-timescale strategies
//!
//! Both strides derive from the simulator time step:
//!
//! ```text
//! coef  = |log10(time_step)|
//! big   = coef * big_step_multiplier
//! small = big / ratio
//! ```
//!
//! then get pushed back into `[low_step_border, high_step_border]` while the
//! big:small ratio stays fixed.

use crate::errors::{Result, RunError};
use tracing::debug;

/// Ratio used when no small step multiplier is configured
pub const DEFAULT_STEP_RATIO: f64 = 2.0;

/// Rescaling never happens before this sample index
pub const RESCALE_MIN_INDEX: u64 = 2000;

/// The big stride tracks `index / RESCALE_DIVISOR` once rescaling kicks in
pub const RESCALE_DIVISOR: f64 = 30.0;

/// Small and big strides with the ratio fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct StridePlan {
    small: f64,
    big: f64,
    ratio: f64,
    low_border: f64,
    high_border: f64,
}

impl StridePlan {
    /// Derive strides from the simulator time step
    ///
    /// `small_step_multiplier == 0` means "use [`DEFAULT_STEP_RATIO`]".
    pub fn derive(
        time_step: f64,
        big_step_multiplier: f64,
        small_step_multiplier: f64,
        low_step_border: f64,
        high_step_border: f64,
    ) -> Result<Self> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(RunError::Misconfigured(format!(
                "simulator time step must be positive, got {}",
                time_step
            )));
        }
        if !(big_step_multiplier > 0.0) || small_step_multiplier < 0.0 {
            return Err(RunError::Misconfigured(
                "step multipliers must be positive".to_string(),
            ));
        }
        if small_step_multiplier >= big_step_multiplier {
            return Err(RunError::Misconfigured(format!(
                "small_step_multiplier ({}) must be less than big_step_multiplier ({})",
                small_step_multiplier, big_step_multiplier
            )));
        }
        if !(low_step_border > 0.0) || high_step_border < low_step_border {
            return Err(RunError::Misconfigured(format!(
                "step borders must satisfy 0 < low ({}) <= high ({})",
                low_step_border, high_step_border
            )));
        }

        let ratio = if small_step_multiplier == 0.0 {
            DEFAULT_STEP_RATIO
        } else {
            big_step_multiplier / small_step_multiplier
        };

        let coef = time_step.log10().abs();
        let mut big = coef * big_step_multiplier;
        let mut small = big / ratio;

        if small < low_step_border {
            small = low_step_border;
            big = small * ratio;
        }
        if big > high_step_border {
            big = high_step_border;
            small = big / ratio;
        }

        debug!(small, big, ratio, "derived window strides");

        Ok(Self {
            small,
            big,
            ratio,
            low_border: low_step_border,
            high_border: high_step_border,
        })
    }

    pub fn small(&self) -> f64 {
        self.small
    }

    pub fn big(&self) -> f64 {
        self.big
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn low_border(&self) -> f64 {
        self.low_border
    }

    pub fn high_border(&self) -> f64 {
        self.high_border
    }

    /// Grow both strides so the big one keeps up with `index / 30`
    ///
    /// Returns `true` when the strides changed. The big stride never exceeds
    /// the high border.
    pub fn rescale(&mut self, index: u64) -> bool {
        if index <= RESCALE_MIN_INDEX {
            return false;
        }
        let target = (index as f64 / RESCALE_DIVISOR).min(self.high_border);
        if self.big >= target {
            return false;
        }
        self.big = target;
        self.small = target / self.ratio;
        true
    }
}
