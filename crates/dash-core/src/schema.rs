//! Schema inference over event samples

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::Event;

/// Sample values kept per field
pub const MAX_SAMPLE_VALUES: usize = 3;

/// Weight of the sample-volume term in summary confidence
pub const VOLUME_WEIGHT: f64 = 0.6;
/// Weight of the field-coverage term in summary confidence
pub const COVERAGE_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    /// Only nulls observed
    Null,
    /// Conflicting non-null types across events
    Mixed,
}

impl FieldType {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Null, b) => b,
            (a, Self::Null) => a,
            _ => Self::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub name: String,
    pub field_type: FieldType,
    /// Missing or null in at least one sampled event
    pub nullable: bool,
    pub sample_values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSummary {
    pub fields: Vec<FieldSummary>,
    pub event_types: Vec<String>,
    pub event_count: usize,
    pub confidence: f64,
}

impl SchemaSummary {
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSummary> {
        self.fields.iter().find(|f| f.name == name)
    }
}

struct FieldAccumulator {
    field_type: FieldType,
    seen: usize,
    saw_null: bool,
    samples: Vec<Value>,
}

/// Infer fields and event types from a sample
///
/// Fields are the canonical `type`, `name`, `state` and `timestamp` plus
/// every label key. The returned confidence is zero; see
/// [`summary_confidence`].
#[must_use]
pub fn analyze(events: &[Event]) -> SchemaSummary {
    let mut fields: BTreeMap<String, FieldAccumulator> = BTreeMap::new();
    let mut event_types: Vec<String> = Vec::new();

    for event in events {
        if !event_types.contains(&event.kind) {
            event_types.push(event.kind.clone());
        }

        let canonical = [
            ("type", Value::String(event.kind.clone())),
            ("name", event.name.clone().map_or(Value::Null, Value::String)),
            ("state", event.state.clone().map_or(Value::Null, Value::String)),
            ("timestamp", Value::String(event.timestamp.to_rfc3339())),
        ];
        let observations = canonical
            .iter()
            .map(|(k, v)| (*k, v))
            .chain(event.labels.iter().map(|(k, v)| (k.as_str(), v)));

        for (name, value) in observations {
            let acc = fields.entry(name.to_string()).or_insert_with(|| FieldAccumulator {
                field_type: FieldType::Null,
                seen: 0,
                saw_null: false,
                samples: Vec::new(),
            });
            acc.seen += 1;
            acc.field_type = acc.field_type.merge(FieldType::of(value));
            if value.is_null() {
                acc.saw_null = true;
            } else if acc.samples.len() < MAX_SAMPLE_VALUES && !acc.samples.contains(value) {
                acc.samples.push(value.clone());
            }
        }
    }

    SchemaSummary {
        fields: fields
            .into_iter()
            .map(|(name, acc)| FieldSummary {
                name,
                field_type: acc.field_type,
                nullable: acc.saw_null || acc.seen < events.len(),
                sample_values: acc.samples,
            })
            .collect(),
        event_types,
        event_count: events.len(),
        confidence: 0.0,
    }
}

/// `0.6 * min(1, n / target_sample) + 0.4 * min(1, fields / target_fields)`
#[must_use]
pub fn summary_confidence(event_count: usize, field_count: usize, target_sample: usize, target_fields: usize) -> f64 {
    let ratio = |n: usize, target: usize| {
        if target == 0 {
            1.0
        } else {
            (n as f64 / target as f64).min(1.0)
        }
    };
    let raw = VOLUME_WEIGHT * ratio(event_count, target_sample) + COVERAGE_WEIGHT * ratio(field_count, target_fields);
    (raw * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::normalize;
    use crate::types::PlatformType;
    use serde_json::json;

    #[test]
    fn infers_types_nullability_and_samples() {
        let events = normalize(
            "t",
            "s",
            PlatformType::Vapi,
            &[
                json!({"id": "1", "type": "call.ended", "duration": 30, "cost": 0.1}),
                json!({"id": "2", "type": "call.ended", "duration": 45}),
                json!({"id": "3", "type": "message", "duration": 30, "cost": null}),
            ],
        );

        let summary = analyze(&events);

        assert_eq!(summary.event_count, 3);
        assert_eq!(summary.event_types, vec!["call.ended", "message"]);
        let duration = summary.field("duration").unwrap();
        assert_eq!(duration.field_type, FieldType::Number);
        assert!(!duration.nullable);
        assert_eq!(duration.sample_values, vec![json!(30), json!(45)]);
        let cost = summary.field("cost").unwrap();
        assert!(cost.nullable);
        assert_eq!(cost.field_type, FieldType::Number);
        assert!(summary.field("name").unwrap().nullable);
    }

    #[test]
    fn mixed_types_are_flagged() {
        let events = normalize(
            "t",
            "s",
            PlatformType::Make,
            &[json!({"id": "1", "x": 1}), json!({"id": "2", "x": "one"})],
        );
        assert_eq!(analyze(&events).field("x").unwrap().field_type, FieldType::Mixed);
    }

    #[test]
    fn confidence_saturates() {
        assert_eq!(summary_confidence(0, 0, 50, 8), 0.0);
        assert_eq!(summary_confidence(25, 4, 50, 8), 0.5);
        assert_eq!(summary_confidence(500, 80, 50, 8), 1.0);
    }
}
