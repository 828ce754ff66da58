//! Event type definitions for the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::{Error, Result};

/// Behavioral event as captured by the client SDK and placed on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RawEvent {
    /// Event name, e.g. `$pageview` or `$autocapture`
    #[validate(length(min = 1))]
    pub event: String,
    #[validate(length(min = 1))]
    pub distinct_id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Capture time; payloads without one are stamped on decode.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl RawEvent {
    pub fn new(event: impl Into<String>, distinct_id: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            distinct_id: distinct_id.into(),
            properties: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Decodes and validates a queue payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let event: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| Error::validation(format!("invalid event payload: {}", e)))?;

        event
            .validate()
            .map_err(|e| Error::validation(format!("invalid event schema: {}", e)))?;

        Ok(event)
    }

    /// Serializes the event into its queue/storage payload form.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Semantic view of a raw event.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub user_id: String,
    pub session_id: String,
    pub semantic_label: String,
    pub original_event: RawEvent,
}

/// Storage-bound projection of an enriched record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistableEvent {
    pub user_id: String,
    pub session_id: String,
    pub semantic_label: String,
    /// Serialized original event; this is what gets dead-lettered
    pub raw_payload: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EnrichedRecord> for PersistableEvent {
    type Error = Error;

    fn try_from(record: EnrichedRecord) -> Result<Self> {
        let raw_payload = record.original_event.to_payload()?;

        Ok(Self {
            user_id: record.user_id,
            session_id: record.session_id,
            semantic_label: record.semantic_label,
            raw_payload,
            created_at: record.original_event.timestamp,
        })
    }
}
