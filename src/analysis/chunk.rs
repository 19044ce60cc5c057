//! Fixed-capacity sample chunks and the window pairs built from them
//!
//! A [`Chunk`] is a ring buffer positioned at `[low_index, high_index)` of the
//! global sample stream. A [`WindowPair`] holds a "current" and a "next" chunk
//! of one timescale and swaps them every time "next" fills:
//!
//! ```text
//!   current            gap = step         next
//! [low .. high) ---------------------- [high+step .. high+step+size)
//! ```

use crate::analysis::types::{ComparisonPoint, Timescale, WindowComparison};

/// Ring buffer of samples with a mean cached on every completed fill
#[derive(Debug, Clone)]
pub struct Chunk {
    storage: Vec<f64>,
    cursor: usize,
    mean: Option<f64>,
    low_index: u64,
    high_index: u64,
}

impl Chunk {
    /// Create a chunk covering `[low_index, low_index + capacity)`
    ///
    /// Capacity must be non-zero; strategy constructors validate this.
    pub fn new(low_index: u64, capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            storage: vec![0.0; capacity],
            cursor: 0,
            mean: None,
            low_index,
            high_index: low_index + capacity as u64,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn low_index(&self) -> u64 {
        self.low_index
    }

    pub fn high_index(&self) -> u64 {
        self.high_index
    }

    /// Whether a global sample index falls inside this chunk's range
    pub fn contains(&self, index: u64) -> bool {
        self.low_index <= index && index < self.high_index
    }

    /// Store a sample at the cursor
    ///
    /// Returns `true` when this append completed a fill. The cursor then wraps
    /// to 0 and later appends overwrite the oldest samples.
    pub fn append(&mut self, sample: f64) -> bool {
        self.storage[self.cursor] = sample;
        self.cursor += 1;
        if self.cursor < self.storage.len() {
            return false;
        }
        self.cursor = 0;
        self.mean = Some(self.storage.iter().sum::<f64>() / self.storage.len() as f64);
        true
    }

    /// Mean as of the last completed fill, `None` before the first one
    pub fn mean(&self) -> Option<f64> {
        self.mean
    }

    /// Logical midpoint of the chunk's index range
    pub fn midpoint(&self) -> u64 {
        (self.low_index + self.high_index) / 2
    }

    /// Move the chunk to a new range; the cached mean is dropped until the
    /// chunk fills again
    pub fn rebase(&mut self, low_index: u64) {
        self.low_index = low_index;
        self.high_index = low_index + self.storage.len() as u64;
        self.cursor = 0;
        self.mean = None;
    }

    /// Forget all samples, keeping the range
    pub fn reset(&mut self) {
        self.storage.iter_mut().for_each(|v| *v = 0.0);
        self.cursor = 0;
        self.mean = None;
    }

    fn point(&self) -> Option<ComparisonPoint> {
        self.mean.map(|mean| ComparisonPoint {
            x: self.midpoint(),
            mean,
        })
    }
}

/// Two chunks of one timescale, compared and swapped whenever "next" fills
#[derive(Debug, Clone)]
pub struct WindowPair {
    timescale: Timescale,
    current: Chunk,
    next: Chunk,
    step: f64,
    swaps: u64,
}

impl WindowPair {
    /// Create a pair whose "current" chunk starts at index 0
    pub fn new(timescale: Timescale, chunk_size: usize, step: f64) -> Self {
        let current = Chunk::new(0, chunk_size);
        let next = Chunk::new(current.high_index() + stride(step), chunk_size);
        Self {
            timescale,
            current,
            next,
            step,
            swaps: 0,
        }
    }

    pub fn timescale(&self) -> Timescale {
        self.timescale
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Change the stride; it takes effect at the next swap
    pub fn set_step(&mut self, step: f64) {
        self.step = step;
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    pub fn current(&self) -> &Chunk {
        &self.current
    }

    pub fn next(&self) -> &Chunk {
        &self.next
    }

    /// Route one sample by its global index
    ///
    /// Returns the frozen comparison points when this sample filled "next".
    /// Samples landing in the gap between the chunks are ignored.
    pub fn push(&mut self, index: u64, sample: f64) -> Option<WindowComparison> {
        if self.current.contains(index) {
            self.current.append(sample);
            return None;
        }
        if !self.next.contains(index) || !self.next.append(sample) {
            return None;
        }

        let comparison = match (self.current.point(), self.next.point()) {
            (Some(current), Some(next)) => Some(WindowComparison {
                timescale: self.timescale,
                current,
                next,
            }),
            _ => None,
        };

        std::mem::swap(&mut self.current, &mut self.next);
        let low = self.current.high_index() + stride(self.step);
        self.next.rebase(low);
        self.swaps += 1;

        comparison
    }
}

fn stride(step: f64) -> u64 {
    if step.is_finite() && step > 0.0 {
        step.round() as u64
    } else {
        0
    }
}
