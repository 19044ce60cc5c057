//! Fixed-duration impulse cutoff
//!
//! Stops a stage once its physical duration exceeds a target, independent of
//! convergence. A light impulse cutoff only applies while the device is
//! illuminated, a dark one only while it is not.
//!
//! State machine:
//!
//! ```text
//! Armed --elapsed > target, gate open, no dump--> Tripped
//! Tripped --illumination changes--> Armed
//! ```

use crate::analysis::Verdict;
use crate::errors::{Result, RunError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Gating physical condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Illumination {
    On,
    Off,
}

impl Illumination {
    /// Any non-zero intensity counts as illuminated
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity != 0.0 {
            Illumination::On
        } else {
            Illumination::Off
        }
    }

    pub fn from_flag(illuminated: bool) -> Self {
        if illuminated {
            Illumination::On
        } else {
            Illumination::Off
        }
    }
}

/// Which regime a cutoff limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpulseKind {
    Light,
    Dark,
}

impl ImpulseKind {
    /// Whether the cutoff applies under this illumination
    pub fn applies(&self, illumination: Illumination) -> bool {
        matches!(
            (self, illumination),
            (ImpulseKind::Light, Illumination::On) | (ImpulseKind::Dark, Illumination::Off)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpulseKind::Light => "light",
            ImpulseKind::Dark => "dark",
        }
    }
}

/// Cutoff state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoffState {
    Armed,
    /// Tripped under the recorded illumination
    Tripped { illumination: Illumination },
}

/// Duration limit for one impulse kind
#[derive(Debug, Clone)]
pub struct ImpulseCutoff {
    kind: ImpulseKind,
    target_duration_ps: f64,
    timestep_constant: Option<f64>,
    illumination: Illumination,
    state: CutoffState,
}

impl ImpulseCutoff {
    pub fn new(kind: ImpulseKind, target_duration_ps: f64, illumination: Illumination) -> Result<Self> {
        if !(target_duration_ps.is_finite() && target_duration_ps > 0.0) {
            return Err(RunError::Config(format!(
                "{} impulse target_duration_ps must be positive, got {}",
                kind.as_str(),
                target_duration_ps
            )));
        }
        Ok(Self {
            kind,
            target_duration_ps,
            timestep_constant: None,
            illumination,
            state: CutoffState::Armed,
        })
    }

    /// Set the picoseconds-per-sample constant
    pub fn calibrate(&mut self, timestep_constant: f64) {
        self.timestep_constant = Some(timestep_constant);
    }

    pub fn with_timestep_constant(mut self, timestep_constant: Option<f64>) -> Self {
        self.timestep_constant = timestep_constant;
        self
    }

    pub fn kind(&self) -> ImpulseKind {
        self.kind
    }

    pub fn state(&self) -> CutoffState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == CutoffState::Armed
    }

    /// Physical time of a sample count, once calibrated
    pub fn elapsed_ps(&self, sample_count: u64) -> Option<f64> {
        self.timestep_constant.map(|c| sample_count as f64 * c)
    }

    /// Evaluate at a sample count
    ///
    /// Never trips while a snapshot dump is in progress.
    pub fn observe(&mut self, sample_count: u64, dumping: bool) -> Verdict {
        if let CutoffState::Tripped { .. } = self.state {
            return Verdict::Stop;
        }
        let Some(elapsed) = self.elapsed_ps(sample_count) else {
            return Verdict::Continue;
        };
        if elapsed > self.target_duration_ps && self.kind.applies(self.illumination) && !dumping {
            info!(
                kind = self.kind.as_str(),
                elapsed_ps = elapsed,
                target_ps = self.target_duration_ps,
                "stopped by fixed impulse time"
            );
            self.state = CutoffState::Tripped {
                illumination: self.illumination,
            };
            return Verdict::Stop;
        }
        Verdict::Continue
    }

    /// Record the illumination of a new stage
    ///
    /// Returns `true` when the change re-armed a tripped cutoff.
    pub fn set_illumination(&mut self, illumination: Illumination) -> bool {
        self.illumination = illumination;
        match self.state {
            CutoffState::Tripped { illumination: at } if at != illumination => {
                info!(kind = self.kind.as_str(), "cutoff re-armed by illumination change");
                self.state = CutoffState::Armed;
                true
            }
            _ => false,
        }
    }
}
