//! Shared helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use steadyrun::simulator::{LineSource, Termination};
use steadyrun::Result;

/// Line source replaying canned output
pub struct ScriptedSource {
    lines: VecDeque<Vec<u8>>,
    terminations: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|l| format!("{}\n", l.as_ref()).into_bytes())
                .collect(),
            terminations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of terminate calls, readable after the driver consumed the source
    pub fn terminations(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.terminations)
    }
}

#[async_trait]
impl LineSource for ScriptedSource {
    async fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        match self.lines.pop_front() {
            Some(line) => {
                buf.extend_from_slice(&line);
                Ok(line.len())
            }
            None => Ok(0),
        }
    }

    async fn terminate(&mut self) -> Result<Termination> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(Termination::default())
    }
}

/// Sample line in the simulator's current column format
pub fn sample_line(value: f64) -> String {
    format!(" {:.6E}  0.1000E+01  0.0000E+00", value)
}

pub fn terminated_once(counter: &Arc<AtomicUsize>) -> bool {
    counter.load(Ordering::SeqCst) == 1
}
