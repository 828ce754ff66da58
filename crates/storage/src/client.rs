//! Postgres connection pool wrapper.

use crate::config::StorageConfig;
use pipeline_core::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Postgres client wrapper with connection pooling.
#[derive(Clone)]
pub struct StorageClient {
    pool: PgPool,
    config: StorageConfig,
}

impl StorageClient {
    /// Opens the connection pool and verifies connectivity.
    pub async fn connect(config: StorageConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await
            .map_err(|e| Error::persistence(format!("Failed to connect to Postgres: {}", e)))?;

        info!(
            table = %config.table,
            max_connections = config.max_connections,
            "Created Postgres pool"
        );

        Ok(Self { pool, config })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool, config: StorageConfig) -> Self {
        Self { pool, config }
    }

    /// Returns the inner pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
