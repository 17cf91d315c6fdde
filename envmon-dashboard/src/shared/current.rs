//! Most recent reading shown on the summary cards

use super::types::Sample;

/// Holds the freshest known sample regardless of history eviction
#[derive(Debug, Clone, Default)]
pub struct CurrentReading {
    sample: Option<Sample>,
}

impl CurrentReading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally overwrite the tracked reading.
    ///
    /// No timestamp check: callers only pass data newer than what is held.
    pub fn set(&mut self, sample: Sample) {
        self.sample = Some(sample);
    }

    /// `None` until the first sample has been observed
    pub fn get(&self) -> Option<&Sample> {
        self.sample.as_ref()
    }
}
