//! Common test setup functions.

use std::sync::Arc;
use tokio::task::JoinHandle;
use worker::{Shutdown, Worker, WorkerConfig, WorkerStats};

use crate::mocks::{MockQueue, MockSink};

/// Main queue name used by the mocked pipelines.
pub const MAIN_QUEUE: &str = "events";

/// Test context wiring a real worker loop to the in-memory queue and sink.
///
/// The worker runs the production code path; only Redis and Postgres are
/// replaced by [`MockQueue`] and [`MockSink`].
pub struct TestContext {
    pub queue: MockQueue,
    pub sink: MockSink,
    pub config: WorkerConfig,
}

impl TestContext {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            queue: MockQueue::new(MAIN_QUEUE),
            sink: MockSink::new(),
            config,
        }
    }

    /// Context with the given flush thresholds and default timings.
    pub fn with_batching(batch_size: usize, flush_interval_secs: f64) -> Self {
        Self::new(WorkerConfig {
            batch_size,
            flush_interval_secs,
            ..WorkerConfig::default()
        })
    }

    pub fn dlq_name(&self) -> &str {
        &self.config.dlq_name
    }

    /// Payloads currently in the DLQ, decoded as JSON.
    pub fn dead_lettered(&self) -> Vec<serde_json::Value> {
        self.queue
            .contents(&self.config.dlq_name)
            .iter()
            .map(|p| crate::fixtures::parse_payload(p))
            .collect()
    }

    pub fn enqueue_all(&self, events: &[serde_json::Value]) {
        for event in events {
            self.queue.enqueue(event);
        }
    }

    /// Spawns the worker loop.
    pub fn start(&self) -> RunningWorker {
        let (shutdown, signal) = Shutdown::new();
        let worker = Worker::new(
            Arc::new(self.queue.clone()),
            Arc::new(self.sink.clone()),
            self.config.clone(),
        );

        RunningWorker {
            shutdown,
            handle: tokio::spawn(worker.run(signal)),
        }
    }
}

/// Handle to a spawned worker.
pub struct RunningWorker {
    shutdown: Shutdown,
    handle: JoinHandle<WorkerStats>,
}

impl RunningWorker {
    /// Triggers shutdown and waits for the drain to finish.
    pub async fn stop(self) -> WorkerStats {
        self.shutdown.trigger();
        self.handle.await.expect("worker task panicked")
    }

    /// Drops the trigger without calling it and waits for the worker.
    pub async fn abandon(self) -> WorkerStats {
        drop(self.shutdown);
        self.handle.await.expect("worker task panicked")
    }
}
