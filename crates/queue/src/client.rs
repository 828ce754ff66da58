//! Queue client abstraction.
//!
//! The worker only talks to the queue through [`EventQueue`], so the Redis
//! implementation can be swapped for an in-memory one in tests.

use async_trait::async_trait;
use pipeline_core::{RawEvent, Result};
use std::time::Duration;
use telemetry::metrics;
use tracing::warn;

/// Outcome of a single pop.
///
/// Transport failures are reported through the surrounding `Result`; this
/// only distinguishes the non-error cases.
#[derive(Debug, Clone, PartialEq)]
pub enum Popped {
    /// Nothing arrived before the timeout.
    Empty,
    /// A decoded, schema-valid event.
    Event(RawEvent),
    /// A payload was consumed but failed validation and was dropped.
    Discarded,
}

impl Popped {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Decodes a popped payload, dropping it if it fails validation.
///
/// Malformed payloads are not retried: they would fail again.
pub fn decode_payload(payload: &[u8]) -> Popped {
    match RawEvent::from_payload(payload) {
        Ok(event) => Popped::Event(event),
        Err(e) => {
            metrics().events_malformed.inc();
            warn!(
                error = %e,
                payload = %String::from_utf8_lossy(payload),
                "Dropping malformed queue payload"
            );
            Popped::Discarded
        }
    }
}

/// Durable blocking FIFO queue.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Name of the main queue `push` and `pop` operate on.
    fn queue_name(&self) -> &str;

    /// Appends a pre-serialized payload to the tail of a named queue.
    async fn push_raw(&self, queue_name: &str, payload: &str) -> Result<()>;

    /// Appends several payloads to a named queue.
    ///
    /// Implementations backed by a store with pipelining should override this
    /// so the whole slice lands in one round trip.
    async fn push_raw_many(&self, queue_name: &str, payloads: &[String]) -> Result<()> {
        for payload in payloads {
            self.push_raw(queue_name, payload).await?;
        }
        Ok(())
    }

    /// Serializes an event and appends it to the main queue.
    async fn push(&self, event: &RawEvent) -> Result<()> {
        let payload = event.to_payload()?;
        self.push_raw(self.queue_name(), &payload).await?;
        metrics().events_pushed.inc();
        Ok(())
    }

    /// Blocks up to `timeout` for the next item on the main queue.
    async fn pop(&self, timeout: Duration) -> Result<Popped>;

    /// Releases the underlying connection. Safe to call more than once.
    async fn close(&self);
}
