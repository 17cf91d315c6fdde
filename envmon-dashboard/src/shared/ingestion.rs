//! Reconciles the one-shot history load with live feed arrivals
//!
//! A two-state sequencer: while the history request is outstanding, live
//! samples are held in a side queue; once it resolves (successfully or
//! not) the buffer is initialised and the queue is replayed in arrival
//! order. A history load that resolves late can therefore never overwrite
//! live samples that raced ahead of it.

use std::collections::{HashSet, VecDeque};
use std::fmt::Display;

use chrono::TimeZone;
use tracing::{debug, info, warn};

use super::current::CurrentReading;
use super::history::HistoryBuffer;
use super::projector::{project, ViewModel};
use super::types::Sample;

/// Sequencing state of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// History request `generation` is outstanding; live arrivals queue up
    AwaitingHistory { generation: u64, pending: Vec<Sample> },
    /// History resolved, live arrivals append directly
    Live,
    /// Session ended, every further event is ignored
    TornDown,
}

/// Owns the history buffer and current reading for one dashboard session
#[derive(Debug, Clone)]
pub struct Ingestion {
    history: HistoryBuffer,
    current: CurrentReading,
    phase: Phase,
    generation: u64,
}

impl Ingestion {
    /// Starts waiting for history request generation 0
    pub fn new(capacity: usize) -> Self {
        Self {
            history: HistoryBuffer::new(capacity),
            current: CurrentReading::new(),
            phase: Phase::AwaitingHistory {
                generation: 0,
                pending: Vec::new(),
            },
            generation: 0,
        }
    }

    /// Live feed delivered a decoded sample
    pub fn on_live(&mut self, sample: Sample) {
        match &mut self.phase {
            Phase::AwaitingHistory { pending, .. } => {
                debug!("Queueing live sample {} until history resolves", sample.id);
                // Only the last `capacity` queued samples can survive the replay
                if pending.len() >= self.history.capacity() {
                    pending.remove(0);
                }
                self.current.set(sample.clone());
                pending.push(sample);
            }
            Phase::Live => {
                self.current.set(sample.clone());
                self.history.append(sample);
            }
            Phase::TornDown => {}
        }
    }

    /// History request `generation` returned `samples` (any order)
    pub fn on_history_loaded(&mut self, generation: u64, samples: Vec<Sample>) {
        let Some(pending) = self.take_pending(generation) else {
            return;
        };

        info!("Loaded {} historical samples", samples.len());
        self.history.initialize(samples);
        if let Some(latest) = self.history.latest() {
            self.current.set(latest.clone());
        }
        self.replay(pending);
    }

    /// History request `generation` failed; the buffer keeps what it had
    pub fn on_history_failed(&mut self, generation: u64) {
        let Some(pending) = self.take_pending(generation) else {
            return;
        };

        warn!("History unavailable, continuing with live data only");
        self.replay(pending);
    }

    /// Start waiting for a fresh history load. Returns its generation.
    ///
    /// Results of earlier requests are ignored from now on. The current
    /// buffer stays visible until the new load resolves.
    pub fn begin_reload(&mut self) -> u64 {
        if self.phase == Phase::TornDown {
            return self.generation;
        }
        self.generation += 1;
        let pending = match std::mem::replace(&mut self.phase, Phase::Live) {
            Phase::AwaitingHistory { pending, .. } => pending,
            _ => Vec::new(),
        };
        self.phase = Phase::AwaitingHistory {
            generation: self.generation,
            pending,
        };
        self.generation
    }

    /// Stop accepting events for good
    pub fn teardown(&mut self) {
        self.phase = Phase::TornDown;
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Generation of the most recent history request
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_initialized(&self) -> bool {
        self.phase == Phase::Live
    }

    pub fn is_torn_down(&self) -> bool {
        self.phase == Phase::TornDown
    }

    pub fn pending_len(&self) -> usize {
        match &self.phase {
            Phase::AwaitingHistory { pending, .. } => pending.len(),
            _ => 0,
        }
    }

    pub fn history(&self) -> &VecDeque<Sample> {
        self.history.snapshot()
    }

    pub fn current(&self) -> Option<&Sample> {
        self.current.get()
    }

    pub fn view_model<Tz>(&self, tz: &Tz) -> ViewModel
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        project(self.history.snapshot(), self.current.get(), tz)
    }

    /// Leave `AwaitingHistory` if `generation` is the outstanding request
    fn take_pending(&mut self, generation: u64) -> Option<Vec<Sample>> {
        match &self.phase {
            Phase::AwaitingHistory { generation: expected, .. } if *expected == generation => {}
            Phase::TornDown => return None,
            _ => {
                debug!("Ignoring stale history result (generation {})", generation);
                return None;
            }
        }

        match std::mem::replace(&mut self.phase, Phase::Live) {
            Phase::AwaitingHistory { pending, .. } => Some(pending),
            _ => None,
        }
    }

    /// Append queued live samples after the history base, skipping any the
    /// base already contains. Repeats within the queue are kept, as they
    /// would be on the live path.
    fn replay(&mut self, pending: Vec<Sample>) {
        if pending.is_empty() {
            return;
        }
        debug!("Replaying {} queued live samples", pending.len());

        let base: HashSet<String> = self
            .history
            .snapshot()
            .iter()
            .map(|s| s.id.clone())
            .collect();
        for sample in pending {
            if base.contains(&sample.id) {
                continue;
            }
            self.current.set(sample.clone());
            self.history.append(sample);
        }
    }
}
