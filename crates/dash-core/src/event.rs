//! Canonical platform events and payload normalization

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::types::PlatformType;

/// Natural id keys, tried in order
const ID_KEYS: &[&[&str]] = &[
    &["id"],
    &["event_id", "eventId"],
    &["call_id", "callId"],
    &["execution_id", "executionId"],
];
const TYPE_KEYS: &[&str] = &["type", "event_type", "eventType"];
const NAME_KEYS: &[&str] = &["name", "workflowName", "workflow_name", "scenarioName", "scenario_name"];
const STATE_KEYS: &[&str] = &["state", "status", "endedReason", "ended_reason"];
const TIMESTAMP_KEYS: &[&str] = &[
    "timestamp",
    "createdAt",
    "created_at",
    "startedAt",
    "started_at",
];

/// Canonical event row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub tenant_id: String,
    pub source_id: String,
    pub platform_event_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub state: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub labels: BTreeMap<String, Value>,
}

impl Event {
    /// Uniqueness key within the event store
    #[must_use]
    pub fn natural_key(&self) -> (&str, &str) {
        (&self.source_id, &self.platform_event_id)
    }
}

/// Convert raw platform payloads into canonical events
///
/// Non-object payloads are skipped. Payloads without a natural id get a
/// content id `evt-<hash>` from the payload bytes, so the same payload keeps
/// its id wherever it lands in a batch.
#[must_use]
pub fn normalize(tenant_id: &str, source_id: &str, platform: PlatformType, payloads: &[Value]) -> Vec<Event> {
    payloads
        .iter()
        .enumerate()
        .filter_map(|(index, payload)| match payload.as_object() {
            Some(object) => Some(normalize_one(tenant_id, source_id, platform, object)),
            None => {
                tracing::warn!(index, "skipping non-object platform payload");
                None
            }
        })
        .collect()
}

fn normalize_one(
    tenant_id: &str,
    source_id: &str,
    platform: PlatformType,
    object: &Map<String, Value>,
) -> Event {
    let timestamp = first_present(object, TIMESTAMP_KEYS)
        .and_then(parse_timestamp)
        .unwrap_or_default();

    let platform_event_id = ID_KEYS
        .iter()
        .find_map(|aliases| first_present(object, aliases).and_then(scalar_string))
        .unwrap_or_else(|| content_id(object));

    let kind = first_present(object, TYPE_KEYS)
        .and_then(scalar_string)
        .unwrap_or_else(|| format!("{platform}.event"));

    let labels = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "type" | "name" | "state" | "timestamp"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Event {
        tenant_id: tenant_id.to_string(),
        source_id: source_id.to_string(),
        platform_event_id,
        kind,
        name: first_present(object, NAME_KEYS).and_then(scalar_string),
        state: first_present(object, STATE_KEYS).and_then(scalar_string),
        timestamp,
        labels,
    }
}

/// Keys of a serde_json map serialize sorted, so equal payloads hash equal
fn content_id(object: &Map<String, Value>) -> String {
    let bytes = serde_json::to_vec(object).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("evt-{}", hex::encode(&digest[..16]))
}

fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| object.get(*k)).find(|v| !v.is_null())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339 strings or epoch milliseconds
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
