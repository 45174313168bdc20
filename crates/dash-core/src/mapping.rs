//! Greedy mapping of required template fields onto observed fields

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Required field -> observed field assignment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub mappings: BTreeMap<String, String>,
    pub missing_fields: Vec<String>,
    pub confidence: f64,
}

impl FieldMapping {
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }

    /// Observed field assigned to `required`
    #[must_use]
    pub fn resolve(&self, required: &str) -> Option<&str> {
        self.mappings.get(required).map(String::as_str)
    }

    /// Merge operator-supplied assignments and recompute what is missing
    ///
    /// Only assignments for fields in `required` whose target is one of
    /// `available` are taken; the rest are returned as rejected.
    pub fn merge_overrides(
        &mut self,
        required: &[&str],
        available: &[String],
        overrides: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let mut rejected = Vec::new();
        for (field, target) in overrides {
            if required.contains(&field.as_str()) && available.contains(target) {
                self.mappings.insert(field.clone(), target.clone());
            } else {
                rejected.push(field.clone());
            }
        }
        self.missing_fields = required
            .iter()
            .filter(|f| !self.mappings.contains_key(**f))
            .map(ToString::to_string)
            .collect();
        self.confidence = confidence(required.len(), required.len() - self.missing_fields.len());
        rejected
    }
}

/// Lowercase with underscores removed
#[must_use]
pub fn normalize_field(name: &str) -> String {
    name.chars().filter(|c| *c != '_').flat_map(char::to_lowercase).collect()
}

/// Match `required` against `observed`
///
/// Exact matches are claimed first for every required field; the remainder
/// are then matched to the first unclaimed observed field whose normalized
/// name contains the normalized required name. Each observed field is used
/// at most once.
#[must_use]
pub fn generate_mapping(required: &[&str], observed: &[String]) -> FieldMapping {
    let mut mappings = BTreeMap::new();
    let mut claimed: HashSet<&str> = HashSet::new();

    for field in required {
        if let Some(hit) = observed.iter().find(|o| o.as_str() == *field && !claimed.contains(o.as_str())) {
            claimed.insert(hit);
            mappings.insert((*field).to_string(), hit.clone());
        }
    }

    for field in required {
        if mappings.contains_key(*field) {
            continue;
        }
        let wanted = normalize_field(field);
        if let Some(hit) = observed
            .iter()
            .find(|o| !claimed.contains(o.as_str()) && normalize_field(o).contains(&wanted))
        {
            claimed.insert(hit);
            mappings.insert((*field).to_string(), hit.clone());
        }
    }

    let missing_fields: Vec<String> = required
        .iter()
        .filter(|f| !mappings.contains_key(**f))
        .map(ToString::to_string)
        .collect();
    let confidence = confidence(required.len(), mappings.len());

    FieldMapping {
        mappings,
        missing_fields,
        confidence,
    }
}

fn confidence(required: usize, matched: usize) -> f64 {
    if required == 0 {
        1.0
    } else {
        let raw = matched as f64 / required as f64;
        (raw * 1000.0).round() / 1000.0
    }
}
