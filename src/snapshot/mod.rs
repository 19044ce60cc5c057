//! Distribution snapshot extraction
//!
//! The simulator periodically rewrites a set of distribution files in its
//! working directory. A dump starts with the dump marker line and is complete
//! once the next sample line appears; at that point the files are copied to
//! `<archive_root>/<stage>/<sample_index>/`.

use crate::errors::{Result, RunError};
use crate::stream::LineKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Physical time window in which snapshots are kept
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreservingRange {
    /// Window start in ps
    pub start: f64,
    /// Window end in ps
    pub stop: f64,
    /// Desired time between dumps in ps
    pub step: f64,
}

impl PreservingRange {
    /// Check bounds and clamp an oversized step to the window end
    pub fn validated(mut self) -> Result<Self> {
        if !(self.start.is_finite() && self.stop.is_finite() && self.start < self.stop) {
            return Err(RunError::Config(format!(
                "preserving range start ({}) must be below stop ({})",
                self.start, self.stop
            )));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(RunError::Config(format!(
                "preserving range step must be positive, got {}",
                self.step
            )));
        }
        if self.step > self.stop {
            self.step = self.stop;
        }
        Ok(self)
    }

    /// Whether an elapsed time falls inside the window
    ///
    /// The end is widened by one sample so the last dump inside the window
    /// is still completed.
    pub fn contains(&self, elapsed_ps: f64, timestep_constant: f64) -> bool {
        self.start <= elapsed_ps && elapsed_ps <= self.stop + timestep_constant
    }

    /// Dump period in samples for the simulator's parameter file
    pub fn dump_period_samples(&self, timestep_constant: f64) -> u64 {
        if timestep_constant > 0.0 {
            (self.step / timestep_constant).round().max(1.0) as u64
        } else {
            1
        }
    }
}

/// Extractor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpState {
    Idle,
    Dumping,
}

/// Copies distribution files after each completed dump
#[derive(Debug, Clone)]
pub struct SnapshotExtractor {
    source_dir: PathBuf,
    archive_root: PathBuf,
    stage_name: String,
    filenames: Vec<String>,
    range: Option<PreservingRange>,
    timestep_constant: Option<f64>,
    state: DumpState,
    saved: u64,
}

impl SnapshotExtractor {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        archive_root: impl Into<PathBuf>,
        stage_name: impl Into<String>,
        filenames: Vec<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            archive_root: archive_root.into(),
            stage_name: stage_name.into(),
            filenames,
            range: None,
            timestep_constant: None,
            state: DumpState::Idle,
            saved: 0,
        }
    }

    /// Only keep snapshots inside a time window
    pub fn with_range(mut self, range: Option<PreservingRange>) -> Self {
        self.range = range;
        self
    }

    pub fn with_timestep_constant(mut self, timestep_constant: Option<f64>) -> Self {
        self.timestep_constant = timestep_constant;
        self
    }

    pub fn calibrate(&mut self, timestep_constant: f64) {
        self.timestep_constant = Some(timestep_constant);
        if let Some(range) = &self.range {
            info!(
                stage = %self.stage_name,
                dump_period = range.dump_period_samples(timestep_constant),
                "snapshot dump period"
            );
        }
    }

    pub fn set_stage(&mut self, stage_name: impl Into<String>) {
        self.stage_name = stage_name.into();
    }

    pub fn state(&self) -> DumpState {
        self.state
    }

    /// Whether snapshots are limited to a time window
    pub fn has_range(&self) -> bool {
        self.range.is_some()
    }

    pub fn is_dumping(&self) -> bool {
        self.state == DumpState::Dumping
    }

    /// Snapshots written so far
    pub fn saved(&self) -> u64 {
        self.saved
    }

    fn in_range(&self, sample_index: u64) -> bool {
        let Some(range) = &self.range else {
            return true;
        };
        // a ranged extractor waits for calibration
        self.timestep_constant
            .map(|c| range.contains(sample_index as f64 * c, c))
            .unwrap_or(false)
    }

    /// Advance on one classified line
    ///
    /// Returns the snapshot directory when a dump completed on this line.
    pub fn observe(&mut self, kind: LineKind, sample_index: u64) -> Result<Option<PathBuf>> {
        if !self.in_range(sample_index) {
            return Ok(None);
        }
        match (self.state, kind) {
            (DumpState::Idle, LineKind::DumpMarker) => {
                debug!(sample_index, "distribution dump started");
                self.state = DumpState::Dumping;
                Ok(None)
            }
            (DumpState::Dumping, LineKind::Sample(_)) => {
                self.state = DumpState::Idle;
                let dir = self.copy_files(sample_index)?;
                self.saved += 1;
                Ok(Some(dir))
            }
            _ => Ok(None),
        }
    }

    fn copy_files(&self, sample_index: u64) -> Result<PathBuf> {
        let dir = self
            .archive_root
            .join(&self.stage_name)
            .join(sample_index.to_string());
        std::fs::create_dir_all(&dir)?;

        for name in &self.filenames {
            let source = self.source_dir.join(name);
            copy_one(&source, &dir.join(name))?;
        }
        debug!(dir = %dir.display(), files = self.filenames.len(), "snapshot saved");
        Ok(dir)
    }
}

fn copy_one(source: &Path, destination: &Path) -> Result<()> {
    match std::fs::copy(source, destination) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RunError::SnapshotSourceMissing {
            path: source.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extractor(source: &TempDir, archive: &TempDir) -> SnapshotExtractor {
        std::fs::write(source.path().join("ww.dat"), "1 2 3\n").unwrap();
        SnapshotExtractor::new(
            source.path(),
            archive.path(),
            "Light",
            vec!["ww.dat".to_string()],
        )
    }

    #[test]
    fn test_dump_completes_on_next_sample() {
        let (source, archive) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let mut ex = extractor(&source, &archive);

        assert_eq!(ex.observe(LineKind::Sample(1.0), 0).unwrap(), None);
        assert_eq!(ex.observe(LineKind::DumpMarker, 1).unwrap(), None);
        assert!(ex.is_dumping());
        assert_eq!(ex.observe(LineKind::Other, 1).unwrap(), None);
        assert_eq!(ex.observe(LineKind::DumpMarker, 1).unwrap(), None);

        let dir = ex.observe(LineKind::Sample(2.0), 1).unwrap().unwrap();
        assert_eq!(dir, archive.path().join("Light").join("1"));
        assert_eq!(std::fs::read_to_string(dir.join("ww.dat")).unwrap(), "1 2 3\n");
        assert_eq!(ex.state(), DumpState::Idle);
        assert_eq!(ex.saved(), 1);
    }

    #[test]
    fn test_missing_source_file() {
        let (source, archive) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let mut ex = SnapshotExtractor::new(
            source.path(),
            archive.path(),
            "Dark",
            vec!["absent.dat".to_string()],
        );
        ex.observe(LineKind::DumpMarker, 0).unwrap();
        assert!(matches!(
            ex.observe(LineKind::Sample(0.0), 0),
            Err(RunError::SnapshotSourceMissing { .. })
        ));
    }

    #[test]
    fn test_range_gates_dumps() {
        let (source, archive) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let range = PreservingRange {
            start: 10.0,
            stop: 20.0,
            step: 5.0,
        }
        .validated()
        .unwrap();
        let mut ex = extractor(&source, &archive)
            .with_range(Some(range))
            .with_timestep_constant(Some(1.0));

        // before the window the marker is ignored
        ex.observe(LineKind::DumpMarker, 5).unwrap();
        assert!(!ex.is_dumping());

        ex.observe(LineKind::DumpMarker, 21).unwrap();
        assert!(ex.is_dumping());
        assert!(ex.observe(LineKind::Sample(0.0), 21).unwrap().is_some());

        ex.observe(LineKind::DumpMarker, 22).unwrap();
        assert!(!ex.is_dumping());
    }

    #[test]
    fn test_ranged_extractor_waits_for_calibration() {
        let (source, archive) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let range = PreservingRange {
            start: 0.0,
            stop: 20.0,
            step: 5.0,
        };
        let mut ex = extractor(&source, &archive).with_range(Some(range));
        ex.observe(LineKind::DumpMarker, 1).unwrap();
        assert!(!ex.is_dumping());
        ex.calibrate(1.0);
        ex.observe(LineKind::DumpMarker, 1).unwrap();
        assert!(ex.is_dumping());
    }

    #[test]
    fn test_range_validation() {
        let bad = PreservingRange {
            start: 5.0,
            stop: 5.0,
            step: 1.0,
        };
        assert!(bad.validated().is_err());

        let clamped = PreservingRange {
            start: 0.0,
            stop: 10.0,
            step: 50.0,
        }
        .validated()
        .unwrap();
        assert_eq!(clamped.step, 10.0);
        assert_eq!(clamped.dump_period_samples(0.5), 20);
    }
}
