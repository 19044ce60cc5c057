//! Command-line argument parsing for steadyrun
//!
//! Provides a clap-based CLI with verbosity control.

use clap::Parser;
use std::path::PathBuf;

/// steadyrun - Run a transient simulator until its output reaches steady state
#[derive(Parser, Debug)]
#[command(name = "steadyrun")]
#[command(version)]
#[command(about = "Run a transient simulator until its output reaches steady state", long_about = None)]
pub struct Args {
    /// Simulator executable (overrides simulator.executable)
    #[arg(value_name = "EXECUTABLE")]
    pub executable: Option<PathBuf>,

    /// Stop after this many output lines
    #[arg(value_name = "MAX_LINES")]
    pub max_lines: Option<u64>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stage to run (first configured stage by default)
    #[arg(short, long)]
    pub stage: Option<String>,

    /// Raw output file (overrides output.raw_output)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Default log filter when RUST_LOG is unset
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::VeryVerbose => "trace",
        }
    }

    /// Check if the end-of-run summary should be printed
    pub fn show_summary(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let args = Args::parse_from(["steadyrun", "./sim/treada", "2000"]);
        assert_eq!(args.executable, Some(PathBuf::from("./sim/treada")));
        assert_eq!(args.max_lines, Some(2000));
        assert_eq!(args.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_no_arguments() {
        let args = Args::parse_from(["steadyrun"]);
        assert!(args.executable.is_none());
        assert!(args.max_lines.is_none());
    }

    #[test]
    fn test_verbosity_quiet() {
        let args = Args::parse_from(["steadyrun", "-q", "-v"]);
        assert_eq!(args.verbosity(), Verbosity::Quiet);
        assert_eq!(args.verbosity().filter_directive(), "warn");
        assert!(!args.verbosity().show_summary());
    }

    #[test]
    fn test_verbosity_levels() {
        let args = Args::parse_from(["steadyrun", "-v"]);
        assert_eq!(args.verbosity(), Verbosity::Verbose);
        assert_eq!(args.verbosity().filter_directive(), "debug");

        let args = Args::parse_from(["steadyrun", "-vv"]);
        assert_eq!(args.verbosity(), Verbosity::VeryVerbose);
        assert_eq!(args.verbosity().as_str(), "very_verbose");
    }

    #[test]
    fn test_options() {
        let args = Args::parse_from([
            "steadyrun",
            "sim",
            "--stage",
            "dark",
            "-c",
            "run.toml",
            "-o",
            "raw.txt",
            "--report",
            "report.json",
        ]);
        assert_eq!(args.stage.as_deref(), Some("dark"));
        assert_eq!(args.config, Some(PathBuf::from("run.toml")));
        assert_eq!(args.output, Some(PathBuf::from("raw.txt")));
        assert_eq!(args.report, Some(PathBuf::from("report.json")));
    }

    #[test]
    fn test_rejects_non_numeric_limit() {
        assert!(Args::try_parse_from(["steadyrun", "sim", "many"]).is_err());
    }
}
