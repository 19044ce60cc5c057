//! Run driver: the I/O loop over simulator output
//!
//! Each line is fully processed in order: classification, calibration,
//! convergence, snapshot extraction, cutoffs, then echo. The stop decision is
//! taken after the line has been echoed, so the line that triggered it is
//! still visible in the output.

use crate::analysis::{ConvergenceCondition, Detector};
use crate::cutoff::{Illumination, ImpulseCutoff};
use crate::errors::{Result, RunError};
use crate::runner::interrupt::InterruptFlag;
use crate::runner::sink::LineSink;
use crate::simulator::{LineSource, Termination};
use crate::snapshot::SnapshotExtractor;
use crate::stream::{classify, Calibration, LineKind};
use crate::telemetry::{RunEvent, RunStats, RunTelemetry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Convergence detector reported steady state
    Converged,
    /// Fixed impulse duration reached
    Cutoff,
    /// Configured line limit reached
    LineLimit,
    /// User interrupt
    Interrupted,
    /// Simulator closed its output
    StreamEnded,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Converged => "converged",
            StopReason::Cutoff => "cutoff",
            StopReason::LineLimit => "line limit",
            StopReason::Interrupted => "interrupted",
            StopReason::StreamEnded => "stream ended",
        }
    }

    /// Stopped by the driver's own logic rather than externally
    pub fn is_early_stop(&self) -> bool {
        matches!(self, StopReason::Converged | StopReason::Cutoff)
    }
}

/// Summary of one finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stage: String,
    pub reason: StopReason,
    pub strategy: Option<String>,
    pub lines: u64,
    pub samples: u64,
    pub undecodable_lines: u64,
    pub snapshots: u64,
    pub timestep_constant: Option<f64>,
    pub elapsed_ps: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub io_loop_seconds: f64,
    pub exit_code: Option<i32>,
    pub killed: bool,
}

impl RunReport {
    /// Write as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Stage being driven
#[derive(Debug, Clone, PartialEq)]
pub struct StageInfo {
    pub name: String,
    pub illumination: Illumination,
    /// First sample index; later stages repeat the previous stage's last sample
    pub sample_offset: u64,
}

impl StageInfo {
    pub fn new(name: impl Into<String>, illumination: Illumination, number: u32) -> Self {
        Self {
            name: name.into(),
            illumination,
            sample_offset: if number < 2 { 0 } else { 1 },
        }
    }
}

/// Drives simulator stages to stop decisions, one source per stage
pub struct RunDriver<S: LineSource> {
    source: S,
    sink: LineSink,
    calibration: Calibration,
    detector: Option<Detector>,
    cutoffs: Vec<ImpulseCutoff>,
    extractor: Option<SnapshotExtractor>,
    interrupt: InterruptFlag,
    max_lines: Option<u64>,
    stage: StageInfo,
    sample_index: u64,
    telemetry: RunTelemetry,
}

impl<S: LineSource> RunDriver<S> {
    pub fn new(source: S, sink: LineSink, calibration: Calibration) -> Self {
        Self {
            source,
            sink,
            calibration,
            detector: None,
            cutoffs: Vec::new(),
            extractor: None,
            interrupt: InterruptFlag::new(),
            max_lines: None,
            stage: StageInfo::new("transient", Illumination::On, 1),
            sample_index: 0,
            telemetry: RunTelemetry::new(),
        }
    }

    pub fn with_detector(mut self, detector: Option<Detector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_cutoff(mut self, mut cutoff: ImpulseCutoff) -> Self {
        cutoff.set_illumination(self.stage.illumination);
        if let Some(c) = self.calibration.timestep_constant() {
            cutoff.calibrate(c);
        }
        self.cutoffs.push(cutoff);
        self
    }

    pub fn with_extractor(mut self, extractor: Option<SnapshotExtractor>) -> Self {
        self.extractor = extractor.map(|mut ex| {
            ex.set_stage(self.stage.name.clone());
            if let Some(c) = self.calibration.timestep_constant() {
                ex.calibrate(c);
            }
            ex
        });
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_max_lines(mut self, max_lines: Option<u64>) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub fn with_stage(mut self, stage: StageInfo) -> Self {
        self.enter_stage(stage);
        self
    }

    /// Switch to a new stage
    ///
    /// Cutoffs see the stage's illumination, which may re-arm them.
    pub fn enter_stage(&mut self, stage: StageInfo) {
        for cutoff in &mut self.cutoffs {
            cutoff.set_illumination(stage.illumination);
        }
        if let Some(ex) = self.extractor.as_mut() {
            ex.set_stage(stage.name.clone());
        }
        self.sample_index = stage.sample_offset;
        self.stage = stage;
    }

    /// Continue with the next stage on a fresh source
    ///
    /// Cutoffs and the snapshot extractor carry over, so a tripped cutoff
    /// stays tripped unless the new stage's illumination re-arms it. Counters
    /// start over and `detector` replaces the previous stage's detector.
    pub fn next_stage(&mut self, source: S, stage: StageInfo, detector: Option<Detector>) {
        self.source = source;
        self.detector = detector;
        self.telemetry = RunTelemetry::new();
        self.enter_stage(stage);
    }

    pub fn stats(&self) -> &RunStats {
        self.telemetry.stats()
    }

    /// Run the loop to a stop decision, then terminate the source
    ///
    /// The source is terminated on every path, errors included. Call
    /// [`RunDriver::next_stage`] before running again.
    pub async fn run(&mut self) -> Result<RunReport> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let outcome = self.pump().await;
        let io_loop_seconds = clock.elapsed().as_secs_f64();

        let termination = self.source.terminate().await;
        let flushed = self.sink.flush();

        let reason = outcome?;
        let termination = termination?;
        flushed?;
        self.log_termination(&termination);

        let stats = self.telemetry.stats().clone();
        let timestep_constant = self.calibration.timestep_constant();
        let report = RunReport {
            stage: self.stage.name.clone(),
            reason,
            strategy: self.detector.as_ref().map(|d| d.name().to_string()),
            lines: stats.lines,
            samples: stats.samples,
            undecodable_lines: stats.undecodable_lines,
            snapshots: stats.snapshots,
            timestep_constant,
            elapsed_ps: timestep_constant.map(|c| self.sample_index as f64 * c),
            started_at,
            io_loop_seconds,
            exit_code: termination.exit_code,
            killed: termination.killed,
        };
        info!(
            stage = %report.stage,
            reason = reason.as_str(),
            lines = report.lines,
            samples = report.samples,
            "run finished"
        );
        Ok(report)
    }

    async fn pump(&mut self) -> Result<StopReason> {
        let interrupt = self.interrupt.clone();
        let mut buf = Vec::with_capacity(256);

        loop {
            if interrupt.is_raised() {
                self.telemetry.record(RunEvent::Interrupted {
                    timestamp: Instant::now(),
                });
                return Ok(StopReason::Interrupted);
            }
            if let Some(max) = self.max_lines {
                if self.telemetry.stats().lines >= max {
                    return Ok(StopReason::LineLimit);
                }
            }

            buf.clear();
            let read = tokio::select! {
                biased;
                _ = interrupt.raised() => continue,
                read = self.source.read_line(&mut buf) => read?,
            };
            if read == 0 {
                return Ok(StopReason::StreamEnded);
            }
            if let Some(reason) = self.process_line(&buf)? {
                return Ok(reason);
            }
        }
    }

    fn process_line(&mut self, bytes: &[u8]) -> Result<Option<StopReason>> {
        self.telemetry.line();

        let Ok(text) = std::str::from_utf8(bytes) else {
            self.telemetry.undecodable();
            self.sink.echo_raw(bytes)?;
            return Ok(None);
        };

        let resolved = match self.calibration.observe(text) {
            Ok(resolved) => resolved,
            Err(RunError::CalibrationNotFound { lookahead }) if !self.needs_calibration() => {
                warn!(lookahead, "relative time not found, elapsed time stays unknown");
                self.calibration.abandon();
                None
            }
            Err(e) => return Err(e),
        };
        if let Some(timestep_constant) = resolved {
            for cutoff in &mut self.cutoffs {
                cutoff.calibrate(timestep_constant);
            }
            if let Some(ex) = self.extractor.as_mut() {
                ex.calibrate(timestep_constant);
            }
            self.telemetry.record(RunEvent::CalibrationResolved {
                timestep_constant,
                timestamp: Instant::now(),
            });
        }

        let kind = classify(text);
        let index = self.sample_index;
        let mut stop = None;

        if let (LineKind::Sample(value), Some(detector)) = (kind, self.detector.as_mut()) {
            if detector.feed(value).should_stop() {
                self.telemetry.record(RunEvent::Converged {
                    strategy: detector.name(),
                    sample_index: index,
                    timestamp: Instant::now(),
                });
                stop = Some(StopReason::Converged);
            }
        }

        let mut dumping = false;
        if let Some(ex) = self.extractor.as_mut() {
            if let Some(dir) = ex.observe(kind, index)? {
                debug!(dir = %dir.display(), "snapshot saved");
                self.telemetry.record(RunEvent::SnapshotSaved {
                    sample_index: index,
                    dir,
                    timestamp: Instant::now(),
                });
            }
            dumping = ex.is_dumping();
        }

        if kind.is_sample() {
            for cutoff in &mut self.cutoffs {
                if cutoff.observe(index, dumping).should_stop() && stop.is_none() {
                    self.telemetry.record(RunEvent::CutoffTripped {
                        kind: cutoff.kind(),
                        sample_index: index,
                        timestamp: Instant::now(),
                    });
                    stop = Some(StopReason::Cutoff);
                }
            }
            self.sample_index += 1;
            self.telemetry.sample();
        }

        self.sink.echo_text(text)?;
        Ok(stop)
    }

    /// Whether any collaborator depends on elapsed physical time
    fn needs_calibration(&self) -> bool {
        !self.cutoffs.is_empty() || self.extractor.as_ref().is_some_and(|ex| ex.has_range())
    }

    fn log_termination(&self, termination: &Termination) {
        let stderr = termination.stderr.trim();
        if !stderr.is_empty() {
            warn!(stage = %self.stage.name, "simulator stderr:\n{}", stderr);
        }
        debug!(
            exit_code = ?termination.exit_code,
            killed = termination.killed,
            "simulator terminated"
        );
    }
}
