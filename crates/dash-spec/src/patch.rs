//! Patch operations over a (spec, tokens) pair
//!
//! Operations are structural edits, not text diffs. They apply in list
//! order to owned copies; the caller's spec and tokens are only borrowed.
//! An operation that names a component the spec does not have is skipped
//! and reported in [`PatchOutcome::errors`], never silently dropped.

use crate::model::{Component, DashboardSpec, DesignTokens, Props};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Single edit to a spec or its tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PatchOperation {
    /// Merge `props_patch` into a component's props
    #[serde(rename_all = "camelCase")]
    UpdateComponentProps {
        component_id: String,
        props_patch: Props,
    },

    /// Append a component
    AddComponent { component: Component },

    /// Remove a component by id
    #[serde(rename_all = "camelCase")]
    RemoveComponent { component_id: String },

    /// Move the named components to the front, in the given order
    #[serde(rename_all = "camelCase")]
    ReorderComponents { ordered_ids: Vec<String> },

    /// Set a design token at a dot path
    #[serde(rename_all = "camelCase")]
    SetDesignToken {
        token_path: String,
        token_value: Value,
    },
}

impl PatchOperation {
    /// Wire name of the operation
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateComponentProps { .. } => "updateComponentProps",
            Self::AddComponent { .. } => "addComponent",
            Self::RemoveComponent { .. } => "removeComponent",
            Self::ReorderComponents { .. } => "reorderComponents",
            Self::SetDesignToken { .. } => "setDesignToken",
        }
    }
}

/// Non-fatal error for a single operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PatchError {
    /// Operation referenced a component id the spec does not contain
    #[error("operation {index} ({operation}): unknown component '{component_id}'")]
    UnknownComponent {
        index: usize,
        operation: &'static str,
        component_id: String,
    },

    /// Token path was empty or malformed
    #[error("operation {index} (setDesignToken): invalid token path '{path}'")]
    InvalidTokenPath { index: usize, path: String },
}

/// Result of applying a patch list
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    /// Patched spec
    pub spec: DashboardSpec,
    /// Patched tokens
    pub tokens: DesignTokens,
    /// Operations that were skipped
    pub errors: Vec<PatchError>,
}

impl PatchOutcome {
    /// Whether every operation applied
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Apply operations in list order
///
/// Never mutates `spec` or `tokens`; the patched pair is returned.
#[must_use]
pub fn apply_patch(
    spec: &DashboardSpec,
    tokens: &DesignTokens,
    operations: &[PatchOperation],
) -> PatchOutcome {
    let mut outcome = PatchOutcome {
        spec: spec.clone(),
        tokens: tokens.clone(),
        errors: Vec::new(),
    };

    for (index, operation) in operations.iter().enumerate() {
        apply_one(&mut outcome, index, operation);
    }

    outcome
}

fn apply_one(outcome: &mut PatchOutcome, index: usize, operation: &PatchOperation) {
    let unknown = |component_id: &str| PatchError::UnknownComponent {
        index,
        operation: operation.name(),
        component_id: component_id.to_string(),
    };

    match operation {
        PatchOperation::UpdateComponentProps {
            component_id,
            props_patch,
        } => {
            match outcome
                .spec
                .components
                .iter_mut()
                .find(|c| &c.id == component_id)
            {
                Some(component) => {
                    for (key, value) in props_patch {
                        component.props.insert(key.clone(), value.clone());
                    }
                }
                None => outcome.errors.push(unknown(component_id)),
            }
        }
        PatchOperation::AddComponent { component } => {
            outcome.spec.components.push(component.clone());
        }
        PatchOperation::RemoveComponent { component_id } => {
            let before = outcome.spec.components.len();
            outcome.spec.components.retain(|c| &c.id != component_id);
            if outcome.spec.components.len() == before {
                outcome.errors.push(unknown(component_id));
            }
        }
        PatchOperation::ReorderComponents { ordered_ids } => {
            let known: HashSet<&str> = outcome
                .spec
                .components
                .iter()
                .map(|c| c.id.as_str())
                .collect();
            let missing: Vec<PatchError> = ordered_ids
                .iter()
                .filter(|id| !known.contains(id.as_str()))
                .map(|id| unknown(id))
                .collect();
            outcome.spec.components = reorder(&outcome.spec.components, ordered_ids);
            outcome.errors.extend(missing);
        }
        PatchOperation::SetDesignToken {
            token_path,
            token_value,
        } => {
            if outcome.tokens.set(token_path, token_value.clone()).is_err() {
                outcome.errors.push(PatchError::InvalidTokenPath {
                    index,
                    path: token_path.clone(),
                });
            }
        }
    }
}

/// Named components first in `ordered_ids` order, the rest after in their
/// original relative order. Cardinality is preserved.
fn reorder(components: &[Component], ordered_ids: &[String]) -> Vec<Component> {
    let mut taken = vec![false; components.len()];
    let mut result = Vec::with_capacity(components.len());

    for id in ordered_ids {
        if let Some(pos) = components
            .iter()
            .enumerate()
            .position(|(i, c)| !taken[i] && &c.id == id)
        {
            taken[pos] = true;
            result.push(components[pos].clone());
        }
    }

    for (i, component) in components.iter().enumerate() {
        if !taken[i] {
            result.push(component.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GridPosition, SpecLayout};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_spec() -> DashboardSpec {
        let mut spec = DashboardSpec::new("t", "vapi", SpecLayout::grid(12, 16));
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            let col = u32::try_from(i).unwrap() * 3;
            spec.components.push(
                Component::new(*id, "kpi", GridPosition::new(col, 0, 3, 2))
                    .with_prop("title", json!(id.to_uppercase())),
            );
        }
        spec
    }

    #[test]
    fn update_props_merges() {
        let spec = sample_spec();
        let patch = json!({"color": "red"}).as_object().cloned().unwrap();
        let outcome = apply_patch(
            &spec,
            &DesignTokens::new(),
            &[PatchOperation::UpdateComponentProps {
                component_id: "b".to_string(),
                props_patch: patch,
            }],
        );

        let b = outcome.spec.component("b").unwrap();
        assert_eq!(b.props.get("title"), Some(&json!("B")));
        assert_eq!(b.props.get("color"), Some(&json!("red")));
        assert!(outcome.is_clean());
    }

    #[test]
    fn unknown_component_is_reported_not_dropped() {
        let spec = sample_spec();
        let outcome = apply_patch(
            &spec,
            &DesignTokens::new(),
            &[
                PatchOperation::RemoveComponent {
                    component_id: "zzz".to_string(),
                },
                PatchOperation::RemoveComponent {
                    component_id: "a".to_string(),
                },
            ],
        );

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(
            outcome.errors[0],
            PatchError::UnknownComponent {
                index: 0,
                operation: "removeComponent",
                component_id: "zzz".to_string(),
            }
        );
        assert_eq!(outcome.spec.component_ids(), vec!["b", "c", "d"]);
    }

    #[test]
    fn reorder_subset_appends_rest_in_original_order() {
        let spec = sample_spec();
        let outcome = apply_patch(
            &spec,
            &DesignTokens::new(),
            &[PatchOperation::ReorderComponents {
                ordered_ids: vec!["c".to_string(), "a".to_string()],
            }],
        );
        assert_eq!(outcome.spec.component_ids(), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn reorder_with_unknown_id_still_reorders_known() {
        let spec = sample_spec();
        let outcome = apply_patch(
            &spec,
            &DesignTokens::new(),
            &[PatchOperation::ReorderComponents {
                ordered_ids: vec!["x".to_string(), "d".to_string()],
            }],
        );
        assert_eq!(outcome.spec.component_ids(), vec!["d", "a", "b", "c"]);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn set_design_token_creates_path() {
        let outcome = apply_patch(
            &sample_spec(),
            &DesignTokens::new(),
            &[PatchOperation::SetDesignToken {
                token_path: "theme.spacing.unit".to_string(),
                token_value: json!(4),
            }],
        );
        assert_eq!(outcome.tokens.to_value(), json!({"theme": {"spacing": {"unit": 4}}}));
    }

    #[test]
    fn invalid_token_path_is_reported() {
        let outcome = apply_patch(
            &sample_spec(),
            &DesignTokens::new(),
            &[PatchOperation::SetDesignToken {
                token_path: "theme.".to_string(),
                token_value: json!(4),
            }],
        );
        assert!(matches!(outcome.errors[0], PatchError::InvalidTokenPath { index: 0, .. }));
        assert!(outcome.tokens.is_empty());
    }

    #[test]
    fn inputs_are_not_mutated() {
        let spec = sample_spec();
        let tokens = DesignTokens::new();
        let spec_before = spec.clone();
        let _ = apply_patch(
            &spec,
            &tokens,
            &[
                PatchOperation::RemoveComponent {
                    component_id: "a".to_string(),
                },
                PatchOperation::SetDesignToken {
                    token_path: "x".to_string(),
                    token_value: json!(1),
                },
            ],
        );
        assert_eq!(spec, spec_before);
        assert!(tokens.is_empty());
    }

    #[test]
    fn operations_use_tagged_wire_format() {
        let op: PatchOperation = serde_json::from_value(json!({
            "type": "updateComponentProps",
            "componentId": "a",
            "propsPatch": {"title": "New"}
        }))
        .unwrap();
        assert_eq!(op.name(), "updateComponentProps");

        let value = serde_json::to_value(PatchOperation::ReorderComponents {
            ordered_ids: vec!["a".to_string()],
        })
        .unwrap();
        assert_eq!(value, json!({"type": "reorderComponents", "orderedIds": ["a"]}));
    }
}
