//! Run telemetry
//!
//! Collects run events and counters while the I/O loop is running, and prints
//! the end-of-run summary.

use crate::cutoff::ImpulseKind;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Instant;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum RunEvent {
    CalibrationResolved {
        timestep_constant: f64,
        timestamp: Instant,
    },
    Converged {
        strategy: &'static str,
        sample_index: u64,
        timestamp: Instant,
    },
    CutoffTripped {
        kind: ImpulseKind,
        sample_index: u64,
        timestamp: Instant,
    },
    SnapshotSaved {
        sample_index: u64,
        dir: PathBuf,
        timestamp: Instant,
    },
    Interrupted {
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub lines: u64,
    pub samples: u64,
    pub undecodable_lines: u64,
    pub snapshots: u64,
}

/// Telemetry collector owned by the run driver
#[derive(Debug)]
pub struct RunTelemetry {
    events: Vec<RunEvent>,
    stats: RunStats,
}

impl RunTelemetry {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn line(&mut self) {
        self.stats.lines += 1;
    }

    pub fn sample(&mut self) {
        self.stats.samples += 1;
    }

    pub fn undecodable(&mut self) {
        self.stats.undecodable_lines += 1;
    }

    /// Record an event
    pub fn record(&mut self, event: RunEvent) {
        if let RunEvent::SnapshotSaved { .. } = &event {
            self.stats.snapshots += 1;
        }
        self.events.push(event);
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }
}

impl Default for RunTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// End-of-run console summary
pub struct RunSummary<'a> {
    report: &'a crate::runner::RunReport,
}

impl<'a> RunSummary<'a> {
    pub fn new(report: &'a crate::runner::RunReport) -> Self {
        Self { report }
    }

    /// Print to stdout
    pub fn display(&self) {
        let report = self.report;
        let reason = if report.reason.is_early_stop() {
            report.reason.as_str().green().bold()
        } else {
            report.reason.as_str().yellow().bold()
        };

        println!();
        println!("{} {}", "Stage".bold(), report.stage.cyan());
        println!("─────────────────────────────────────");
        println!("Stop reason:       {}", reason);
        println!("Lines read:        {}", report.lines);
        println!("Samples:           {}", report.samples);
        if report.undecodable_lines > 0 {
            println!("Undecodable lines: {}", report.undecodable_lines.to_string().red());
        }
        match report.elapsed_ps {
            Some(ps) => println!("Simulated time:    {:.3} ps", ps),
            None => println!("Simulated time:    {}", "uncalibrated".dimmed()),
        }
        println!("Snapshots:         {}", report.snapshots);
        println!("I/O loop time:     {:.3} s", report.io_loop_seconds);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let telemetry = RunTelemetry::new();
        assert!(telemetry.events().is_empty());
        assert_eq!(telemetry.stats(), &RunStats::default());
    }

    #[test]
    fn test_counters() {
        let mut telemetry = RunTelemetry::new();
        telemetry.line();
        telemetry.line();
        telemetry.sample();
        telemetry.undecodable();
        assert_eq!(telemetry.stats().lines, 2);
        assert_eq!(telemetry.stats().samples, 1);
        assert_eq!(telemetry.stats().undecodable_lines, 1);
    }

    #[test]
    fn test_snapshot_event_counts() {
        let mut telemetry = RunTelemetry::new();
        telemetry.record(RunEvent::SnapshotSaved {
            sample_index: 4,
            dir: PathBuf::from("out/Light/4"),
            timestamp: Instant::now(),
        });
        telemetry.record(RunEvent::Interrupted {
            timestamp: Instant::now(),
        });
        assert_eq!(telemetry.stats().snapshots, 1);
        assert_eq!(telemetry.events().len(), 2);
    }
}
