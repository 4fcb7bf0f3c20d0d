//! Advertising and scanning controllers.
//!
//! Each controller owns one state machine and turns public operations into
//! arbiter batches.  The observable state only ever moves when a batch
//! settles, so it is always one of the stable states; batches that have
//! been submitted but not settled are tracked alongside as *pending*.

pub mod advertising;
pub mod scanning;

use heapless::Deque;

use crate::arbiter::QUEUE_DEPTH;
use crate::arbiter::command::BatchId;

/// Submitted-but-unsettled batches of one controller, oldest first, each
/// tagged with what it is meant to achieve.
pub(crate) struct PendingBatches<I: Copy> {
    queue: Deque<(BatchId, I), QUEUE_DEPTH>,
}

impl<I: Copy> PendingBatches<I> {
    pub(crate) const fn new() -> Self {
        Self { queue: Deque::new() }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Intent of the most recently submitted batch.
    pub(crate) fn last(&self) -> Option<I> {
        self.queue.back().map(|(_, intent)| *intent)
    }

    pub(crate) fn push(&mut self, batch: BatchId, intent: I) {
        // Callers check `is_full` before submitting.
        let _ = self.queue.push_back((batch, intent));
    }

    /// Remove `batch` and return its intent.  Order of the rest is kept.
    pub(crate) fn take(&mut self, batch: BatchId) -> Option<I> {
        let mut found = None;
        for _ in 0..self.queue.len() {
            let Some(entry) = self.queue.pop_front() else {
                break;
            };
            if found.is_none() && entry.0 == batch {
                found = Some(entry.1);
            } else {
                let _ = self.queue.push_back(entry);
            }
        }
        found
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }
}
