//! Worker configuration.

use pipeline_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Flush once this many events are buffered
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Flush a non-empty buffer once this many seconds passed since the last flush
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: f64,
    /// Upper bound on a single blocking pop
    #[serde(default = "default_pop_timeout_ms")]
    pub pop_timeout_ms: u64,
    /// Pause after an empty pop
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    /// Pause after a queue transport error
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Queue that receives batches and events that could not be processed
    #[serde(default = "default_dlq_name")]
    pub dlq_name: String,
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval_secs() -> f64 {
    2.0
}

fn default_pop_timeout_ms() -> u64 {
    1000
}

fn default_idle_backoff_ms() -> u64 {
    100
}

fn default_error_backoff_ms() -> u64 {
    1000
}

fn default_dlq_name() -> String {
    "events_dlq".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_secs: default_flush_interval_secs(),
            pop_timeout_ms: default_pop_timeout_ms(),
            idle_backoff_ms: default_idle_backoff_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            dlq_name: default_dlq_name(),
        }
    }
}

impl WorkerConfig {
    /// Saturates instead of panicking; `validate` rejects such values.
    pub fn flush_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.flush_interval_secs).unwrap_or(Duration::MAX)
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Rejects values the loop cannot run with. `main_queue` is the queue
    /// the worker pops from; the DLQ must be a different list.
    pub fn validate(&self, main_queue: &str) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("worker.batch_size must be positive"));
        }
        let representable = Duration::try_from_secs_f64(self.flush_interval_secs).is_ok();
        if !(representable && self.flush_interval_secs > 0.0) {
            return Err(Error::config(format!(
                "worker.flush_interval_secs must be a positive number, got {}",
                self.flush_interval_secs
            )));
        }
        if self.pop_timeout_ms == 0 {
            return Err(Error::config("worker.pop_timeout_ms must be positive"));
        }
        if self.dlq_name.trim().is_empty() {
            return Err(Error::config("worker.dlq_name must not be empty"));
        }
        if self.dlq_name == main_queue {
            return Err(Error::config(format!(
                "worker.dlq_name must differ from the main queue ({})",
                main_queue
            )));
        }
        Ok(())
    }
}
