//! Pipeline metrics collected in-memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (last written value wins).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latency histogram with fixed millisecond buckets.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, +inf
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 10] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper_bound_ms, count)` pairs; the overflow bucket reports `u64::MAX`.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.buckets.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Process-wide pipeline metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    // Queue
    pub events_pushed: Counter,
    pub events_popped: Counter,
    pub events_malformed: Counter,
    pub queue_errors: Counter,

    // Enrichment
    pub enrichment_failures: Counter,

    // Storage
    pub batches_committed: Counter,
    pub events_committed: Counter,
    pub commit_errors: Counter,
    pub commit_latency_ms: Histogram,

    // Dead-letter queue
    pub events_dead_lettered: Counter,
    pub dead_letter_errors: Counter,
    /// Events that reached neither storage nor the DLQ
    pub events_lost: Counter,

    pub buffer_depth: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_pushed: u64,
    pub events_popped: u64,
    pub events_malformed: u64,
    pub queue_errors: u64,
    pub enrichment_failures: u64,
    pub batches_committed: u64,
    pub events_committed: u64,
    pub commit_errors: u64,
    pub commit_latency_mean_ms: f64,
    pub events_dead_lettered: u64,
    pub dead_letter_errors: u64,
    pub events_lost: u64,
    pub buffer_depth: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_pushed: self.events_pushed.get(),
            events_popped: self.events_popped.get(),
            events_malformed: self.events_malformed.get(),
            queue_errors: self.queue_errors.get(),
            enrichment_failures: self.enrichment_failures.get(),
            batches_committed: self.batches_committed.get(),
            events_committed: self.events_committed.get(),
            commit_errors: self.commit_errors.get(),
            commit_latency_mean_ms: self.commit_latency_ms.mean(),
            events_dead_lettered: self.events_dead_lettered.get(),
            dead_letter_errors: self.dead_letter_errors.get(),
            events_lost: self.events_lost.get(),
            buffer_depth: self.buffer_depth.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
