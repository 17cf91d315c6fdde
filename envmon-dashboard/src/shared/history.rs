//! Bounded, time-ordered sample history used for charting

use std::collections::VecDeque;

use super::types::Sample;

/// Default number of samples kept for the chart
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// Ring buffer holding the N most recent samples, oldest first
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Capacity is clamped to at least 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the contents with `samples`, sorted ascending by timestamp
    /// and truncated to the `capacity` most recent entries.
    ///
    /// The sort is stable, so samples sharing a timestamp keep their input order.
    pub fn initialize(&mut self, samples: Vec<Sample>) {
        let mut samples = samples;
        samples.sort_by_key(|s| s.timestamp);

        let start = samples.len().saturating_sub(self.capacity);
        self.samples.clear();
        self.samples.extend(samples.into_iter().skip(start));
    }

    /// Push `sample` as the newest element, evicting the oldest when full
    pub fn append(&mut self, sample: Sample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Ordered view of the buffer, oldest first
    pub fn snapshot(&self) -> &VecDeque<Sample> {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent sample, if any
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
