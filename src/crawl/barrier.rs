// src/crawl/barrier.rs
// =============================================================================
// Outstanding-work barrier.
//
// Counts work items that were scheduled but not yet fully processed. The
// crawl is over when the count drops to zero: every enqueue increments it
// before anything asynchronous happens, every dequeue (processed, dropped as
// a duplicate, or failed) decrements it exactly once.
//
// Zero is final: new work is only ever scheduled by a worker that still owns
// an outstanding item, so the count cannot climb back up from zero.
// =============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct WorkBarrier {
    pending: AtomicUsize,
    scheduled: AtomicUsize,
    completed: AtomicUsize,
    drained: Notify,
}

impl WorkBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub fn done(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        let previous = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "barrier decremented below zero");

        if previous == 1 {
            // Stores a permit if nobody is waiting yet
            self.drained.notify_one();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    // Total increments so far
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::Relaxed)
    }

    // Total decrements so far
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    // Resolves once nothing is outstanding
    pub async fn wait(&self) {
        while self.pending() > 0 {
            self.drained.notified().await;
        }
    }
}
