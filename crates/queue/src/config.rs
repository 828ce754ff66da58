//! Queue configuration.

use pipeline_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Redis queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Redis connection URL (redis:// or rediss://)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Main queue the worker consumes from
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_queue_name() -> String {
    "events".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            queue_name: default_queue_name(),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.redis_url.trim().is_empty() {
            return Err(Error::config("queue.redis_url must not be empty"));
        }
        if self.queue_name.trim().is_empty() {
            return Err(Error::config("queue.queue_name must not be empty"));
        }
        Ok(())
    }
}
