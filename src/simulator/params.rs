//! Read-only access to the simulator's parameter file
//!
//! Variables sit one per line as `NAME value` or `NAME = value`. Only the
//! values the run driver needs are read; editing the file is left to the
//! scenario tooling.

use crate::errors::{Result, RunError};
use std::path::{Path, PathBuf};

/// Operating time step
pub const TIME_STEP_VAR: &str = "TSTEP";

/// Illumination intensity, zero means dark
pub const ILLUMINATION_VAR: &str = "ILUMEN";

/// Loaded simulator parameter file
#[derive(Debug, Clone)]
pub struct ParameterFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl ParameterFile {
    /// Read the whole file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            RunError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::from_contents(path, &contents))
    }

    pub fn from_contents(path: PathBuf, contents: &str) -> Self {
        Self {
            path,
            lines: contents.lines().map(str::to_string).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw value of a variable
    pub fn get(&self, name: &str) -> Result<&str> {
        self.lines
            .iter()
            .find_map(|line| {
                line.strip_prefix(name)
                    .filter(|rest| rest.starts_with(' '))
                    .map(|rest| rest.trim_matches(|c: char| c.is_whitespace() || c == '='))
            })
            .ok_or_else(|| RunError::ParameterMissing {
                name: name.to_string(),
                path: self.path.clone(),
            })
    }

    /// Value parsed as a float; Fortran `D` exponents are accepted
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        let raw = self.get(name)?;
        raw.replace(['D', 'd'], "E").parse::<f64>().map_err(|e| {
            RunError::Config(format!(
                "{} = '{}' in {} is not a number: {}",
                name,
                raw,
                self.path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParameterFile {
        ParameterFile::from_contents(
            PathBuf::from("MTUT"),
            "* header\nTSTEP = 1.0D-03\nILUMEN  0.\nTSTEPX 5\nCKLKRS 2.\n",
        )
    }

    #[test]
    fn test_get_with_equals() {
        assert_eq!(sample().get("TSTEP").unwrap(), "1.0D-03");
        assert_eq!(sample().get_f64("TSTEP").unwrap(), 1.0e-3);
    }

    #[test]
    fn test_get_plain() {
        assert_eq!(sample().get_f64(ILLUMINATION_VAR).unwrap(), 0.0);
        assert_eq!(sample().get_f64("CKLKRS").unwrap(), 2.0);
    }

    #[test]
    fn test_prefix_does_not_match_longer_name() {
        let file = ParameterFile::from_contents(PathBuf::from("MTUT"), "TSTEPX 5\n");
        assert!(matches!(
            file.get(TIME_STEP_VAR),
            Err(RunError::ParameterMissing { .. })
        ));
    }

    #[test]
    fn test_non_numeric_value() {
        let file = ParameterFile::from_contents(PathBuf::from("MTUT"), "TSTEP abc\n");
        assert!(matches!(file.get_f64("TSTEP"), Err(RunError::Config(_))));
    }
}
