//! Semantic labelling of raw events.
//!
//! Turns SDK event names and autocapture properties into short
//! human-readable actions that downstream consumers can read directly.

use pipeline_core::{EnrichedRecord, Error, RawEvent, Result};
use serde_json::Value;

const PAGEVIEW: &str = "$pageview";
const AUTOCAPTURE: &str = "$autocapture";

const PATHNAME: &str = "$pathname";
const ELEMENT_TEXT: &str = "$element_text";
const ATTR_CLASS: &str = "attr__class";
const SESSION_ID: &str = "$session_id";

/// CSS class marking the plan upgrade button.
const UPGRADE_BUTTON_CLASS: &str = "upgrade-btn";

/// Session assigned to events captured outside a session.
pub const GLOBAL_SESSION: &str = "global";

/// Enrich a single event.
///
/// Deterministic: the same event always yields the same record. A
/// label-relevant property holding a non-string value is reported as an
/// enrichment error; `null` counts as absent.
pub fn enrich(event: &RawEvent) -> Result<EnrichedRecord> {
    let session_id = string_property(event, SESSION_ID)?
        .unwrap_or(GLOBAL_SESSION)
        .to_string();

    Ok(EnrichedRecord {
        user_id: event.distinct_id.clone(),
        session_id,
        semantic_label: semantic_label(event)?,
        original_event: event.clone(),
    })
}

fn semantic_label(event: &RawEvent) -> Result<String> {
    match event.event.as_str() {
        PAGEVIEW => {
            let path = string_property(event, PATHNAME)?.unwrap_or("unknown");
            return Ok(format!("Viewed page: {}", path));
        }
        AUTOCAPTURE => {
            let class = string_property(event, ATTR_CLASS)?.unwrap_or("");
            if class.contains(UPGRADE_BUTTON_CLASS) {
                return Ok("Clicked 'Upgrade Plan' Button".to_string());
            }

            let text = string_property(event, ELEMENT_TEXT)?.unwrap_or("");
            if !text.is_empty() {
                return Ok(format!("Clicked element: '{}'", text));
            }
        }
        _ => {}
    }

    Ok(format!("Triggered {}", event.event))
}

fn string_property<'a>(event: &'a RawEvent, key: &str) -> Result<Option<&'a str>> {
    match event.properties.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(Error::enrichment(format!(
            "property {} must be a string, got {}",
            key,
            json_type(other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
