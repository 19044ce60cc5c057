//! Relative time calibration
//!
//! Elapsed physical time is `sample_index * timestep_constant`, where
//! `timestep_constant = operating_time_step * relative_time`. The relative
//! time is either configured, computed from the simulator's relative units, or
//! read from the simulator's own output header:
//!
//! ```text
//! RELATIVE UNITES:
//! ...
//! TIME:  0.4812E+00  ...
//! ```

use crate::errors::{Result, RunError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Lines scanned for the relative time before giving up
pub const DEFAULT_LOOKAHEAD_LINES: usize = 500;

const RELATIVE_HEADER: &str = "RELATIVE UNITES:";
const TIME_PREFIX: &str = "TIME:";

fn default_lookahead() -> usize {
    DEFAULT_LOOKAHEAD_LINES
}

/// Where the relative time comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CalibrationConfig {
    /// Known relative time in picoseconds
    Fixed { relative_time_ps: f64 },

    /// Derive from the simulator's relative units
    Units {
        temperature: f64,
        concentration: f64,
        permittivity: f64,
        mobility: f64,
    },

    /// Scan simulator output at runtime
    Runtime {
        #[serde(default = "default_lookahead")]
        lookahead_lines: usize,
    },
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig::Runtime {
            lookahead_lines: DEFAULT_LOOKAHEAD_LINES,
        }
    }
}

/// Relative time in picoseconds from the simulator's relative units
///
/// `temperature` in K, `concentration` in cm^-3, `mobility` in cm^2/(V*s).
pub fn relative_time_from_units(
    temperature: f64,
    concentration: f64,
    permittivity: f64,
    mobility: f64,
) -> f64 {
    let rp = -1.380662e-4 * temperature / 1.6021892;
    let relative_length = (permittivity * temperature * 1.380662e12
        / (4.0 * std::f64::consts::PI * 4.803242_f64.powi(2) * concentration))
        .sqrt();
    let relative_field = -rp / relative_length * 10.0;
    let relative_velocity = relative_field * mobility * 1e3;
    1e8 * relative_length / relative_velocity
}

/// Progress of the timestep constant resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    /// Timestep constant known
    Resolved { timestep_constant: f64 },

    /// Waiting for the relative time in simulator output
    Scanning(RelativeTimeScanner),

    /// Scan gave up and nothing needed the result
    Abandoned,
}

impl Calibration {
    /// Resolve what can be resolved before the simulator starts
    pub fn from_config(config: &CalibrationConfig, operating_time_step: f64) -> Result<Self> {
        let relative_time = match config {
            CalibrationConfig::Fixed { relative_time_ps } => *relative_time_ps,
            CalibrationConfig::Units {
                temperature,
                concentration,
                permittivity,
                mobility,
            } => relative_time_from_units(*temperature, *concentration, *permittivity, *mobility),
            CalibrationConfig::Runtime { lookahead_lines } => {
                return Ok(Calibration::Scanning(RelativeTimeScanner::new(
                    *lookahead_lines,
                    operating_time_step,
                )));
            }
        };
        if !(relative_time.is_finite() && relative_time > 0.0) {
            return Err(RunError::Config(format!(
                "relative time must be positive, got {}",
                relative_time
            )));
        }
        Ok(Calibration::Resolved {
            timestep_constant: operating_time_step * relative_time,
        })
    }

    pub fn timestep_constant(&self) -> Option<f64> {
        match self {
            Calibration::Resolved { timestep_constant } => Some(*timestep_constant),
            Calibration::Scanning(_) | Calibration::Abandoned => None,
        }
    }

    /// Stop scanning without a result
    pub fn abandon(&mut self) {
        *self = Calibration::Abandoned;
    }

    /// Offer one output line while scanning
    ///
    /// Returns the timestep constant on the line that resolves it.
    pub fn observe(&mut self, line: &str) -> Result<Option<f64>> {
        let Calibration::Scanning(scanner) = self else {
            return Ok(None);
        };
        let Some(timestep_constant) = scanner.observe(line)? else {
            return Ok(None);
        };
        *self = Calibration::Resolved { timestep_constant };
        Ok(Some(timestep_constant))
    }
}

/// Looks for the relative time within a bounded number of lines
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeTimeScanner {
    lookahead: usize,
    operating_time_step: f64,
    header_seen: bool,
    lines_seen: usize,
}

impl RelativeTimeScanner {
    pub fn new(lookahead: usize, operating_time_step: f64) -> Self {
        Self {
            lookahead,
            operating_time_step,
            header_seen: false,
            lines_seen: 0,
        }
    }

    /// Returns the timestep constant once the relative time is found
    pub fn observe(&mut self, line: &str) -> Result<Option<f64>> {
        self.lines_seen += 1;
        let trimmed = line.trim_start();

        if trimmed.starts_with(RELATIVE_HEADER) {
            self.header_seen = true;
        } else if self.header_seen && trimmed.starts_with(TIME_PREFIX) {
            if let Some(relative_time) = trimmed[TIME_PREFIX.len()..]
                .split(|c: char| c.is_whitespace() || c == '=')
                .find_map(|token| token.parse::<f64>().ok())
            {
                info!(relative_time, "relative time found in simulator output");
                return Ok(Some(relative_time * self.operating_time_step));
            }
        }

        if self.lines_seen >= self.lookahead {
            return Err(RunError::CalibrationNotFound {
                lookahead: self.lookahead,
            });
        }
        Ok(None)
    }
}
