//! Redis health checks.

use crate::config::QueueConfig;
use redis::Client;
use tracing::{debug, error};

/// Check Redis connection health.
pub async fn check_connection(config: &QueueConfig) -> bool {
    let client = match Client::open(config.redis_url.as_str()) {
        Ok(client) => client,
        Err(e) => {
            error!("Invalid Redis URL: {}", e);
            return false;
        }
    };

    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("Failed to connect to Redis: {}", e);
            return false;
        }
    };

    let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;

    match pong {
        Ok(_) => {
            debug!("Redis connection healthy");
            true
        }
        Err(e) => {
            error!("Redis health check failed: {}", e);
            false
        }
    }
}

/// Returns the current length of a queue, or `None` if Redis is unreachable.
pub async fn queue_depth(config: &QueueConfig, queue_name: &str) -> Option<u64> {
    let client = Client::open(config.redis_url.as_str()).ok()?;
    let mut conn = client.get_multiplexed_async_connection().await.ok()?;

    let len: redis::RedisResult<u64> = redis::cmd("LLEN")
        .arg(queue_name)
        .query_async(&mut conn)
        .await;

    len.ok()
}
