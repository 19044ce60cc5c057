//! Stateless classification of simulator output lines
//!
//! A sample line starts with a signed scientific float followed by whitespace
//! and a second number:
//!
//! ```text
//!  -1.234567E-03  0.1200E+01  ...
//! ```
//!
//! The dump marker announces that the simulator is rewriting its temporary
//! distribution files; the next sample line means the rewrite is complete.

use regex::Regex;
use std::sync::LazyLock;

/// Substring that opens a temporary dump region
pub const DUMP_MARKER: &str = "TIME STEPS WERE MADE WITH STEP LENGTH HT";

static SAMPLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([-+]?\d+\.\d+[eE][-+]?\d+)\s+\d+\.").expect("sample pattern is valid")
});

/// What one output line carries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineKind {
    /// Numeric sample from the leading column
    Sample(f64),

    /// Temporary dump begins
    DumpMarker,

    /// Header, log text or anything else
    Other,
}

impl LineKind {
    pub fn sample(&self) -> Option<f64> {
        match self {
            LineKind::Sample(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_sample(&self) -> bool {
        matches!(self, LineKind::Sample(_))
    }
}

/// Classify one decoded line
pub fn classify(line: &str) -> LineKind {
    if let Some(value) = SAMPLE_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        return LineKind::Sample(value);
    }
    if line.contains(DUMP_MARKER) {
        return LineKind::DumpMarker;
    }
    LineKind::Other
}
