//! Dead-letter routing for events that could not be persisted.
//!
//! The DLQ write is the last line of defence: if it fails too, the payloads
//! are logged at error level and counted as lost. There is no further retry.

use pipeline_core::{Error, PersistableEvent};
use queue::EventQueue;
use std::sync::Arc;
use telemetry::metrics;
use tracing::{error, warn};

/// Result of a dead-letter attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterOutcome {
    /// All payloads were pushed to the DLQ.
    Routed(usize),
    /// The DLQ push failed; the payloads exist only in the error log.
    Lost(usize),
}

/// Pushes original payloads to the dead-letter queue.
pub struct DeadLetterRouter {
    queue: Arc<dyn EventQueue>,
    dlq_name: String,
}

impl DeadLetterRouter {
    pub fn new(queue: Arc<dyn EventQueue>, dlq_name: impl Into<String>) -> Self {
        Self {
            queue,
            dlq_name: dlq_name.into(),
        }
    }

    pub fn dlq_name(&self) -> &str {
        &self.dlq_name
    }

    /// Reroutes a whole failed batch as one unit.
    pub async fn route_batch(&self, batch: &[PersistableEvent], cause: &Error) -> DeadLetterOutcome {
        let payloads: Vec<String> = batch.iter().map(|e| e.raw_payload.clone()).collect();
        self.route(payloads, cause).await
    }

    /// Reroutes a single payload that never made it into a batch.
    pub async fn route_payload(&self, payload: String, cause: &Error) -> DeadLetterOutcome {
        self.route(vec![payload], cause).await
    }

    async fn route(&self, payloads: Vec<String>, cause: &Error) -> DeadLetterOutcome {
        let count = payloads.len();
        if count == 0 {
            return DeadLetterOutcome::Routed(0);
        }

        match self.queue.push_raw_many(&self.dlq_name, &payloads).await {
            Ok(()) => {
                metrics().events_dead_lettered.inc_by(count as u64);
                warn!(
                    dlq = %self.dlq_name,
                    count = count,
                    cause = %cause,
                    cause_code = cause.code(),
                    "Moved events to DLQ"
                );
                DeadLetterOutcome::Routed(count)
            }
            Err(e) => {
                let err = Error::dead_letter(format!("push to {} failed: {}", self.dlq_name, e));
                metrics().dead_letter_errors.inc();
                metrics().events_lost.inc_by(count as u64);

                error!(
                    dlq = %self.dlq_name,
                    count = count,
                    code = err.code(),
                    error = %err,
                    cause = %cause,
                    "DLQ unreachable, events lost"
                );
                for payload in &payloads {
                    error!(dlq = %self.dlq_name, payload = %payload, "Lost event payload");
                }

                DeadLetterOutcome::Lost(count)
            }
        }
    }
}
