//! Analysis system type definitions

/// Outcome of feeding one sample to a convergence condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Transient still evolving
    Continue,

    /// Steady state reached, the run may stop
    Stop,
}

impl Verdict {
    /// Check if should terminate
    pub fn should_stop(&self) -> bool {
        matches!(self, Verdict::Stop)
    }
}

/// Granularity of a window pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timescale {
    Small,
    Big,
}

impl Timescale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timescale::Small => "small",
            Timescale::Big => "big",
        }
    }
}

/// Frozen mean of a full chunk, placed at the chunk's midpoint index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonPoint {
    /// Logical midpoint `(low + high) / 2`
    pub x: u64,

    /// Chunk mean
    pub mean: f64,
}

/// Two frozen points produced when a window pair swaps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowComparison {
    pub timescale: Timescale,
    pub current: ComparisonPoint,
    pub next: ComparisonPoint,
}

impl WindowComparison {
    /// Slope of the line through both points, with means scaled by `y_scale`
    pub fn slope(&self, y_scale: f64) -> f64 {
        let dx = self.next.x as f64 - self.current.x as f64;
        if dx == 0.0 {
            return f64::INFINITY;
        }
        (self.next.mean * y_scale - self.current.mean * y_scale) / dx
    }

    /// Signed difference `next - current`
    pub fn mean_difference(&self) -> f64 {
        self.next.mean - self.current.mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(x1: u64, y1: f64, x2: u64, y2: f64) -> WindowComparison {
        WindowComparison {
            timescale: Timescale::Small,
            current: ComparisonPoint { x: x1, mean: y1 },
            next: ComparisonPoint { x: x2, mean: y2 },
        }
    }

    #[test]
    fn test_verdict_should_stop() {
        assert!(Verdict::Stop.should_stop());
        assert!(!Verdict::Continue.should_stop());
    }

    #[test]
    fn test_slope_scaled() {
        let cmp = comparison(50, 1.0, 150, 2.0);
        assert!((cmp.slope(1e3) - 10.0).abs() < 1e-12);
        assert!((cmp.slope(1.0) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_mean_difference_sign() {
        let cmp = comparison(0, 3.0, 10, 1.0);
        assert_eq!(cmp.mean_difference(), -2.0);
    }
}
