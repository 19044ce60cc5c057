//! Configuration management for steadyrun
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: `./steadyrun.toml` or `~/.steadyrun/config.toml`

use crate::analysis::{registry, ConvergenceParams};
use crate::cutoff::{Illumination, ImpulseCutoff, ImpulseKind};
use crate::errors::{Result, RunError};
use crate::snapshot::{PreservingRange, SnapshotExtractor};
use crate::stream::CalibrationConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Project-local configuration file name
pub const LOCAL_CONFIG: &str = "steadyrun.toml";

/// Complete configuration for steadyrun
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulator: SimulatorConfig,
    pub convergence: ConvergenceParams,
    pub calibration: CalibrationConfig,
    pub cutoff: CutoffConfig,
    pub snapshots: SnapshotConfig,
    pub stages: Vec<StageConfig>,
    pub output: OutputConfig,
}

/// Simulator location and time step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub executable: Option<PathBuf>,
    /// Operating time step, used when there is no parameter file
    pub time_step: f64,
    /// Simulator parameter file holding TSTEP and ILUMEN
    pub parameter_file: Option<PathBuf>,
}

/// Fixed-duration cutoffs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoffConfig {
    pub light: Option<LightCutoffConfig>,
    pub dark: Option<DarkCutoffConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCutoffConfig {
    pub target_duration_ps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarkCutoffConfig {
    pub target_duration_ps: f64,
    /// Stages the dark cutoff applies to
    #[serde(default)]
    pub stages: Vec<String>,
}

/// Distribution snapshot preservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    pub archive_root: PathBuf,
    pub distribution_filenames: Vec<String>,
    /// Per-stage time windows
    pub preserving_ranges: BTreeMap<String, PreservingRange>,
}

/// One simulation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    /// Overrides ILUMEN from the parameter file
    #[serde(default)]
    pub illuminated: Option<bool>,
    #[serde(default = "default_stage_number")]
    pub number: u32,
}

/// Console and file output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub raw_output: Option<PathBuf>,
    pub show_stage_name: bool,
}

fn default_stage_number() -> u32 {
    1
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            executable: None,
            time_step: 1e-3,
            parameter_file: None,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            archive_root: PathBuf::from("result/temporary/distributions"),
            distribution_filenames: Vec::new(),
            preserving_ranges: BTreeMap::new(),
        }
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: "transient".to_string(),
            illuminated: None,
            number: 1,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            raw_output: None,
            show_stage_name: true,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RunError::Config(format!("Failed to read config: {}", e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| RunError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the working directory, then the home directory, else defaults
    pub fn load_default() -> Result<Self> {
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Self::load_from_file(&local);
        }
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".steadyrun").join("config.toml");
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }
        Ok(Config::default())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.simulator.time_step.is_finite() && self.simulator.time_step > 0.0) {
            return Err(RunError::Config(format!(
                "simulator.time_step must be positive, got {}",
                self.simulator.time_step
            )));
        }

        if self.convergence.enabled {
            let strategies = registry();
            if !strategies.contains_key(self.convergence.strategy.as_str()) {
                return Err(RunError::InvalidStrategy {
                    name: self.convergence.strategy.clone(),
                    known: strategies.keys().copied().collect::<Vec<_>>().join(", "),
                });
            }
            self.convergence.chunk_mean.validate()?;
            self.convergence.windowed.validate()?;
        }

        if let Some(light) = &self.cutoff.light {
            positive("cutoff.light.target_duration_ps", light.target_duration_ps)?;
        }
        if let Some(dark) = &self.cutoff.dark {
            positive("cutoff.dark.target_duration_ps", dark.target_duration_ps)?;
        }

        if self.snapshots.enabled && self.snapshots.distribution_filenames.is_empty() {
            return Err(RunError::Config(
                "snapshots.distribution_filenames must not be empty when snapshots are enabled"
                    .to_string(),
            ));
        }
        for range in self.snapshots.preserving_ranges.values() {
            range.validated()?;
        }

        let mut seen = std::collections::HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(RunError::Config("stage name must not be empty".to_string()));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(RunError::Config(format!("duplicate stage '{}'", stage.name)));
            }
        }

        Ok(())
    }

    /// Stage to run: the named one, else the first configured, else a default
    pub fn stage(&self, name: Option<&str>) -> Result<StageConfig> {
        match name {
            Some(name) => self
                .stages
                .iter()
                .find(|s| s.name == name)
                .cloned()
                .ok_or_else(|| RunError::Config(format!("stage '{}' is not configured", name))),
            None => Ok(self.stages.first().cloned().unwrap_or_default()),
        }
    }
}

impl CutoffConfig {
    /// Cutoffs that apply to a stage
    pub fn build(&self, stage_name: &str, illumination: Illumination) -> Result<Vec<ImpulseCutoff>> {
        let mut cutoffs = Vec::new();
        if let Some(light) = &self.light {
            cutoffs.push(ImpulseCutoff::new(
                ImpulseKind::Light,
                light.target_duration_ps,
                illumination,
            )?);
        }
        if let Some(dark) = &self.dark {
            if dark.stages.iter().any(|s| s == stage_name) {
                cutoffs.push(ImpulseCutoff::new(
                    ImpulseKind::Dark,
                    dark.target_duration_ps,
                    illumination,
                )?);
            }
        }
        Ok(cutoffs)
    }
}

impl SnapshotConfig {
    /// Extractor reading from the simulator's working directory, if enabled
    pub fn extractor(&self, working_dir: &Path, stage_name: &str) -> Result<Option<SnapshotExtractor>> {
        if !self.enabled {
            return Ok(None);
        }
        let range = self
            .preserving_ranges
            .get(stage_name)
            .map(|r| r.validated())
            .transpose()?;
        Ok(Some(
            SnapshotExtractor::new(
                working_dir,
                &self.archive_root,
                stage_name,
                self.distribution_filenames.clone(),
            )
            .with_range(range),
        ))
    }
}

fn positive(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RunError::Config(format!("{} must be positive, got {}", key, value)))
    }
}
