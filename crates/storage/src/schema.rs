//! Event table DDL.
//!
//! Statements are idempotent and run once at startup when
//! `storage.bootstrap_schema` is set.

use crate::client::StorageClient;
use pipeline_core::{Error, Result};
use tracing::debug;

/// DDL for the events table and its lookup indexes.
pub fn events_table(table: &str) -> Vec<String> {
    vec![
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {table} (
    id BIGSERIAL PRIMARY KEY,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    semantic_label TEXT NOT NULL,
    raw_payload TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
)
"#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_user_id ON {table} (user_id)"),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_session_id ON {table} (session_id)"),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_user_created ON {table} (user_id, created_at DESC)"
        ),
    ]
}

/// Creates the configured events table if it does not exist.
pub async fn ensure_schema(client: &StorageClient) -> Result<()> {
    let table = &client.config().table;

    for ddl in events_table(table) {
        sqlx::query(&ddl)
            .execute(client.pool())
            .await
            .map_err(|e| Error::persistence(format!("Failed to execute DDL: {}", e)))?;
    }

    debug!(table = %table, "Postgres schema initialized");
    Ok(())
}
