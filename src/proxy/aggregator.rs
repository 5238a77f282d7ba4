//! Thread-safe collection of check outcomes and progress counters

use crate::proxy::models::CheckOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Point-in-time view of the run's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Nodes whose probing has started
    pub processed: u64,
    /// Nodes recorded as available
    pub available: u64,
}

#[derive(Debug, Default)]
struct Collected {
    available: u64,
    outcomes: Vec<CheckOutcome>,
}

/// Shared by all workers of a run.
///
/// The available count and the outcome list live under the same lock so they
/// never diverge. The processed count is bumped as soon as a node has a
/// client, so it may run ahead of the available count by the number of
/// in-flight checks.
#[derive(Debug, Default)]
pub struct Aggregator {
    processed: AtomicU64,
    collected: Mutex<Collected>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn collected(&self) -> MutexGuard<'_, Collected> {
        self.collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a node whose probing is about to start
    pub fn mark_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Record an available node
    pub fn record(&self, outcome: CheckOutcome) {
        let mut collected = self.collected();
        collected.available += 1;
        collected.outcomes.push(outcome);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        // Read available first: a node is always counted as processed before
        // it is recorded, so this order keeps processed >= available.
        let available = self.collected().available;
        let processed = self.processed.load(Ordering::SeqCst);
        ProgressSnapshot {
            processed,
            available,
        }
    }

    /// Take the collected outcomes along with the final counters
    pub fn finish(&self) -> (Vec<CheckOutcome>, ProgressSnapshot) {
        let mut collected = self.collected();
        let outcomes = std::mem::take(&mut collected.outcomes);
        let snapshot = ProgressSnapshot {
            processed: self.processed.load(Ordering::SeqCst),
            available: collected.available,
        };
        (outcomes, snapshot)
    }
}
