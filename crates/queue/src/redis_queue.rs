//! Redis list implementation of [`EventQueue`].
//!
//! Producers append with `RPUSH` and the worker takes from the head with
//! `BLPOP`, which gives FIFO delivery and hands each item to exactly one
//! consumer when several worker processes share a list.

use crate::client::{decode_payload, EventQueue, Popped};
use crate::config::QueueConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline_core::{Error, Result};
use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Smallest timeout handed to `BLPOP`; zero would block forever.
const MIN_BLOCK_SECS: f64 = 0.01;

/// Queue client over a single multiplexed Redis connection.
pub struct RedisQueue {
    config: QueueConfig,
    /// `None` once the queue has been closed
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisQueue {
    /// Connects to Redis. The connection lives until [`EventQueue::close`].
    pub async fn connect(config: QueueConfig) -> Result<Self> {
        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| Error::config(format!("Invalid Redis URL: {}", e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::transport(format!("Failed to connect to Redis: {}", e)))?;

        info!(queue = %config.queue_name, "Connected to Redis queue");

        Ok(Self {
            config,
            connection: Mutex::new(Some(manager)),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Clones the shared connection handle, failing once closed.
    fn connection(&self) -> Result<ConnectionManager> {
        self.connection
            .lock()
            .clone()
            .ok_or_else(|| Error::transport("queue connection is closed"))
    }
}

#[async_trait]
impl EventQueue for RedisQueue {
    fn queue_name(&self) -> &str {
        &self.config.queue_name
    }

    async fn push_raw(&self, queue_name: &str, payload: &str) -> Result<()> {
        let mut conn = self.connection()?;

        let _len: i64 = redis::cmd("RPUSH")
            .arg(queue_name)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::transport(format!("RPUSH to {} failed: {}", queue_name, e)))?;

        Ok(())
    }

    async fn push_raw_many(&self, queue_name: &str, payloads: &[String]) -> Result<()> {
        if payloads.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection()?;

        // MULTI/EXEC so the payloads land together or not at all
        let mut pipe = redis::pipe();
        pipe.atomic();
        for payload in payloads {
            pipe.cmd("RPUSH").arg(queue_name).arg(payload).ignore();
        }

        let () = pipe.query_async(&mut conn).await.map_err(|e| {
            Error::transport(format!(
                "Pipelined RPUSH of {} payloads to {} failed: {}",
                payloads.len(),
                queue_name,
                e
            ))
        })?;

        debug!(queue = %queue_name, count = payloads.len(), "Pushed payloads");
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Popped> {
        let mut conn = self.connection()?;
        let block_secs = timeout.as_secs_f64().max(MIN_BLOCK_SECS);

        let item: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
            .arg(&self.config.queue_name)
            .arg(block_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::transport(format!("BLPOP failed: {}", e)))?;

        Ok(match item {
            Some((_queue, payload)) => decode_payload(&payload),
            None => Popped::Empty,
        })
    }

    async fn close(&self) {
        if self.connection.lock().take().is_some() {
            info!(queue = %self.config.queue_name, "Redis queue connection closed");
        }
    }
}
