//! Property tests for validation and patching.

use dash_spec::{
    apply_patch, validate, validate_value, Component, DashboardSpec, DesignTokens, GridPosition,
    PatchOperation, SpecLayout,
};
use proptest::prelude::*;
use serde_json::json;

fn arb_component() -> impl Strategy<Value = Component> {
    ("[a-e]", 0u32..16, 0u32..8, 0u32..16, 1u32..6).prop_map(|(id, col, row, w, h)| {
        Component::new(id, "kpi", GridPosition::new(col, row, w, h))
    })
}

fn arb_spec() -> impl Strategy<Value = DashboardSpec> {
    (1u32..16, proptest::collection::vec(arb_component(), 0..8)).prop_map(|(columns, components)| {
        let mut spec = DashboardSpec::new("t", "n8n", SpecLayout::grid(columns, 8));
        spec.components = components;
        spec
    })
}

fn arb_operation() -> impl Strategy<Value = PatchOperation> {
    prop_oneof![
        "[a-f]".prop_map(|id| PatchOperation::RemoveComponent { component_id: id }),
        arb_component().prop_map(|component| PatchOperation::AddComponent { component }),
        proptest::collection::vec("[a-f]", 0..4)
            .prop_map(|ordered_ids| PatchOperation::ReorderComponents { ordered_ids }),
        ("[a-f]", "[a-z]{1,6}").prop_map(|(id, title)| PatchOperation::UpdateComponentProps {
            component_id: id,
            props_patch: json!({ "title": title }).as_object().cloned().unwrap_or_default(),
        }),
        ("[a-z]{1,4}(\\.[a-z]{1,4}){0,2}", 0i64..100).prop_map(|(path, v)| {
            PatchOperation::SetDesignToken {
                token_path: path,
                token_value: json!(v),
            }
        }),
    ]
}

proptest! {
    #[test]
    fn prop_score_in_unit_range_and_valid_iff_no_errors(spec in arb_spec()) {
        let result = validate(&spec);
        prop_assert!((0.0..=1.0).contains(&result.score));
        prop_assert_eq!(result.valid, result.errors.is_empty());
    }

    #[test]
    fn prop_raw_and_typed_validation_agree(spec in arb_spec()) {
        let raw = serde_json::to_value(&spec).unwrap();
        prop_assert_eq!(validate_value(&raw), validate(&spec));
    }

    #[test]
    fn prop_reorder_preserves_components(
        spec in arb_spec(),
        ordered_ids in proptest::collection::vec("[a-f]", 0..6),
    ) {
        let outcome = apply_patch(
            &spec,
            &DesignTokens::new(),
            &[PatchOperation::ReorderComponents { ordered_ids }],
        );
        prop_assert_eq!(outcome.spec.components.len(), spec.components.len());
        for component in &spec.components {
            let before = spec.components.iter().filter(|c| *c == component).count();
            let after = outcome.spec.components.iter().filter(|c| *c == component).count();
            prop_assert_eq!(before, after);
        }
    }

    #[test]
    fn prop_apply_patch_never_mutates_inputs(
        spec in arb_spec(),
        operations in proptest::collection::vec(arb_operation(), 0..10),
    ) {
        let tokens = DesignTokens::from_map(
            json!({"theme": {"color": {"primary": "#111"}}}).as_object().cloned().unwrap_or_default(),
        );
        let spec_before = spec.clone();
        let tokens_before = tokens.clone();

        let _ = apply_patch(&spec, &tokens, &operations);

        prop_assert_eq!(spec, spec_before);
        prop_assert_eq!(tokens, tokens_before);
    }
}

#[test]
fn grid_overflow_scenario() {
    let raw = json!({
        "version": "1.0",
        "templateId": "voice-call-analytics",
        "platformType": "vapi",
        "layout": {"type": "grid", "columns": 12, "gap": 16},
        "components": [
            {"id": "kpi-1", "type": "kpi", "props": {}, "layout": {"col": 10, "row": 0, "w": 4, "h": 2}}
        ]
    });

    let result = validate_value(&raw);
    assert!(!result.valid);
    assert!(result.errors.iter().any(|e| e.contains("exceeds grid width")));
    assert_eq!(result.score, 0.9);
}
