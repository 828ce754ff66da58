//! Worker loop: pop → enrich → buffer → flush (store or DLQ) → repeat.
//!
//! The loop owns the batch buffer and runs strictly sequentially, so there is
//! no locking around it. It only ends through the shutdown signal; every other
//! failure is contained to the event or batch that caused it.

use crate::buffer::BatchBuffer;
use crate::config::WorkerConfig;
use crate::dead_letter::{DeadLetterOutcome, DeadLetterRouter};
use crate::enrichment::enrich;
use crate::shutdown::ShutdownSignal;
use pipeline_core::{PersistableEvent, RawEvent};
use queue::{EventQueue, Popped};
use std::sync::Arc;
use std::time::Duration;
use storage::EventSink;
use telemetry::metrics;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerState {
    /// Popping and processing events.
    #[default]
    Running,
    /// Shutdown requested; flushing what is left in the buffer.
    Draining,
    /// Buffer flushed and queue connection closed.
    Stopped,
}

/// Per-run processing counters, returned when the worker stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// `Stopped` once `run` has returned
    pub state: WorkerState,
    pub events_popped: u64,
    pub events_malformed: u64,
    pub enrichment_failures: u64,
    pub batches_committed: u64,
    pub events_committed: u64,
    pub batches_dead_lettered: u64,
    pub events_dead_lettered: u64,
    pub events_lost: u64,
    pub queue_errors: u64,
}

impl WorkerStats {
    fn record_dead_letter(&mut self, outcome: DeadLetterOutcome) {
        match outcome {
            DeadLetterOutcome::Routed(n) => self.events_dead_lettered += n as u64,
            DeadLetterOutcome::Lost(n) => self.events_lost += n as u64,
        }
    }
}

/// What happened to a flushed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Committed(usize),
    DeadLettered(usize),
    Lost(usize),
}

/// Single sequential consumer of the main queue.
pub struct Worker {
    queue: Arc<dyn EventQueue>,
    sink: Arc<dyn EventSink>,
    dead_letter: DeadLetterRouter,
    buffer: BatchBuffer,
    config: WorkerConfig,
    stats: WorkerStats,
}

impl Worker {
    /// Creates a worker around an already connected queue and sink.
    ///
    /// The worker closes the queue when it stops.
    pub fn new(queue: Arc<dyn EventQueue>, sink: Arc<dyn EventSink>, config: WorkerConfig) -> Self {
        let dead_letter = DeadLetterRouter::new(queue.clone(), config.dlq_name.clone());
        let buffer = BatchBuffer::new(config.batch_size, config.flush_interval());

        Self {
            queue,
            sink,
            dead_letter,
            buffer,
            config,
            stats: WorkerStats::default(),
        }
    }

    /// Runs until `shutdown` is triggered, then drains and stops.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> WorkerStats {
        info!(
            queue = %self.queue.queue_name(),
            dlq = %self.dead_letter.dlq_name(),
            batch_size = self.config.batch_size,
            flush_interval_secs = self.config.flush_interval_secs,
            "Worker started, listening"
        );

        // The flush window opens when the loop starts, not at construction
        self.buffer = BatchBuffer::new(self.config.batch_size, self.config.flush_interval());

        while !shutdown.is_triggered() {
            self.step(&mut shutdown).await;
        }

        self.drain().await;
        self.stop().await;
        self.stats
    }

    /// One iteration of the running state.
    async fn step(&mut self, shutdown: &mut ShutdownSignal) {
        match self.queue.pop(self.config.pop_timeout()).await {
            Ok(Popped::Event(event)) => {
                self.stats.events_popped += 1;
                metrics().events_popped.inc();
                self.accept(event).await;
                self.flush_if_due().await;
            }
            Ok(Popped::Discarded) => {
                self.stats.events_malformed += 1;
                self.flush_if_due().await;
            }
            Ok(Popped::Empty) => {
                self.flush_if_due().await;
                pause(self.config.idle_backoff(), shutdown).await;
            }
            Err(e) => {
                self.stats.queue_errors += 1;
                metrics().queue_errors.inc();
                error!(
                    code = e.code(),
                    error = %e,
                    backoff_ms = self.config.error_backoff_ms,
                    "Queue pop failed, backing off"
                );
                // Storage may still be reachable while the queue is not
                self.flush_if_due().await;
                pause(self.config.error_backoff(), shutdown).await;
            }
        }
    }

    /// Enriches and buffers an event, or dead-letters it on failure.
    async fn accept(&mut self, event: RawEvent) {
        match enrich(&event).and_then(PersistableEvent::try_from) {
            Ok(persistable) => {
                self.buffer.push(persistable);
                metrics().buffer_depth.set(self.buffer.len() as u64);
            }
            Err(e) => {
                self.stats.enrichment_failures += 1;
                metrics().enrichment_failures.inc();
                warn!(
                    event = %event.event,
                    distinct_id = %event.distinct_id,
                    error = %e,
                    "Enrichment failed, rerouting event to DLQ"
                );

                match event.to_payload() {
                    Ok(payload) => {
                        let outcome = self.dead_letter.route_payload(payload, &e).await;
                        self.stats.record_dead_letter(outcome);
                    }
                    Err(ser) => {
                        self.stats.events_lost += 1;
                        metrics().events_lost.inc();
                        error!(
                            event = %event.event,
                            distinct_id = %event.distinct_id,
                            error = %ser,
                            "Could not serialize event for DLQ, event lost"
                        );
                    }
                }
            }
        }
    }

    async fn flush_if_due(&mut self) {
        if self.buffer.should_flush(Instant::now()) {
            self.flush().await;
        }
    }

    /// Commits the whole buffer, falling back to the DLQ as one unit.
    ///
    /// The buffer is emptied and the flush timer restarted whatever the outcome.
    async fn flush(&mut self) -> FlushOutcome {
        let batch = self.buffer.take(Instant::now());
        metrics().buffer_depth.set(0);

        let count = batch.len();

        match self.sink.commit(&batch).await {
            Ok(written) => {
                self.stats.batches_committed += 1;
                self.stats.events_committed += written as u64;
                metrics().batches_committed.inc();
                metrics().events_committed.inc_by(written as u64);
                info!(count = written, "Flushed batch");
                FlushOutcome::Committed(written)
            }
            Err(e) => {
                error!(
                    count = count,
                    code = e.code(),
                    error = %e,
                    "Batch commit failed, rerouting batch to DLQ"
                );

                let outcome = self.dead_letter.route_batch(&batch, &e).await;
                self.stats.record_dead_letter(outcome);

                match outcome {
                    DeadLetterOutcome::Routed(n) => {
                        self.stats.batches_dead_lettered += 1;
                        FlushOutcome::DeadLettered(n)
                    }
                    DeadLetterOutcome::Lost(n) => FlushOutcome::Lost(n),
                }
            }
        }
    }

    async fn drain(&mut self) {
        self.stats.state = WorkerState::Draining;
        info!(buffered = self.buffer.len(), "Shutdown requested, draining buffer");

        if !self.buffer.is_empty() {
            let outcome = self.flush().await;
            debug!(?outcome, "Final flush complete");
        }
    }

    async fn stop(&mut self) {
        self.queue.close().await;
        self.stats.state = WorkerState::Stopped;

        let s = &self.stats;
        info!(
            popped = s.events_popped,
            committed = s.events_committed,
            dead_lettered = s.events_dead_lettered,
            malformed = s.events_malformed,
            lost = s.events_lost,
            queue_errors = s.queue_errors,
            "Worker stopped"
        );
    }
}

/// Sleeps for `duration`, waking early on shutdown.
async fn pause(duration: Duration, shutdown: &mut ShutdownSignal) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.triggered() => {}
    }
}
