//! Atomic batch commit of persistable events.

use crate::client::StorageClient;
use async_trait::async_trait;
use pipeline_core::{Error, PersistableEvent, Result};
use sqlx::{Postgres, QueryBuilder};
use telemetry::metrics;
use tracing::{debug, error};

/// Columns bound per row.
const COLUMNS_PER_ROW: usize = 5;

/// Rows per `INSERT` statement, kept well below Postgres' 65535 bind limit.
pub const MAX_ROWS_PER_STATEMENT: usize = 1000;

/// Durable store that accepts whole batches.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Commits every event of the batch or none of them.
    ///
    /// Returns the number of rows written.
    async fn commit(&self, batch: &[PersistableEvent]) -> Result<usize>;
}

/// Postgres sink writing each batch inside one transaction.
pub struct PgEventSink {
    client: StorageClient,
    insert_prefix: String,
}

impl PgEventSink {
    pub fn new(client: StorageClient) -> Self {
        let insert_prefix = insert_prefix(&client.config().table);
        Self {
            client,
            insert_prefix,
        }
    }

    async fn write_batch(&self, batch: &[PersistableEvent]) -> std::result::Result<(), sqlx::Error> {
        let mut tx = self.client.pool().begin().await?;

        for chunk in batch.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut insert: QueryBuilder<Postgres> = QueryBuilder::new(&self.insert_prefix);
            insert.push_values(chunk, |mut row, event| {
                row.push_bind(&event.user_id)
                    .push_bind(&event.session_id)
                    .push_bind(&event.semantic_label)
                    .push_bind(&event.raw_payload)
                    .push_bind(event.created_at);
            });

            insert.build().execute(&mut *tx).await?;
        }

        // Dropping `tx` on an early return above rolls the batch back
        tx.commit().await
    }
}

/// The fixed part of the batch insert statement.
fn insert_prefix(table: &str) -> String {
    format!(
        "INSERT INTO {} (user_id, session_id, semantic_label, raw_payload, created_at) ",
        table
    )
}

#[async_trait]
impl EventSink for PgEventSink {
    async fn commit(&self, batch: &[PersistableEvent]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        let start = std::time::Instant::now();

        if let Err(e) = self.write_batch(batch).await {
            metrics().commit_errors.inc();
            error!(count = count, error = %e, "Postgres batch commit failed, rolled back");
            return Err(Error::persistence(format!(
                "Failed to commit batch of {}: {}",
                count, e
            )));
        }

        let elapsed = start.elapsed();
        metrics().commit_latency_ms.observe(elapsed.as_millis() as u64);

        debug!(
            table = %self.client.config().table,
            count = count,
            bind_params = count * COLUMNS_PER_ROW,
            latency_ms = %elapsed.as_millis(),
            "Committed batch to Postgres"
        );

        Ok(count)
    }
}
