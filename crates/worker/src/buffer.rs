//! In-memory batch accumulator for persistable events.

use pipeline_core::PersistableEvent;
use std::time::Duration;
use tokio::time::Instant;

/// Accumulates events until the batch is full or old enough to flush.
///
/// Age is measured from the last flush boundary on the monotonic clock, not
/// from event timestamps.
#[derive(Debug)]
pub struct BatchBuffer {
    events: Vec<PersistableEvent>,
    max_size: usize,
    max_age: Duration,
    last_flush: Instant,
}

impl BatchBuffer {
    pub fn new(max_size: usize, max_age: Duration) -> Self {
        Self::starting_at(max_size, max_age, Instant::now())
    }

    pub fn starting_at(max_size: usize, max_age: Duration, now: Instant) -> Self {
        Self {
            events: Vec::with_capacity(max_size),
            max_size,
            max_age,
            last_flush: now,
        }
    }

    pub fn push(&mut self, event: PersistableEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_flush(&self) -> Instant {
        self.last_flush
    }

    /// Whether the buffer is full, or non-empty and past its max age.
    pub fn should_flush(&self, now: Instant) -> bool {
        if self.events.is_empty() {
            return false;
        }
        self.events.len() >= self.max_size
            || now.saturating_duration_since(self.last_flush) >= self.max_age
    }

    /// Take every buffered event and start a new flush window at `now`.
    pub fn take(&mut self, now: Instant) -> Vec<PersistableEvent> {
        self.last_flush = now;
        std::mem::replace(&mut self.events, Vec::with_capacity(self.max_size))
    }
}
