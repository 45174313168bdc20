//! Spec rendering from template blueprints and style bundles

use dash_spec::{Component, DashboardSpec, DesignTokens, GridLayout, SpecLayout};
use serde_json::{json, Value};

use crate::mapping::FieldMapping;
use crate::template::Template;
use crate::types::PlatformType;

pub const DEFAULT_STYLE_BUNDLE: &str = "professional-clean";

/// Named design-token presets
pub const STYLE_BUNDLES: &[&str] = &[DEFAULT_STYLE_BUNDLE, "dark-ops", "vibrant"];

fn bundle_value(bundle_id: &str) -> Option<Value> {
    let tokens = match bundle_id {
        DEFAULT_STYLE_BUNDLE => json!({
            "color": {"primary": "#2563eb", "background": "#ffffff", "text": "#111827", "muted": "#6b7280"},
            "font": {"family": "Inter, sans-serif", "size": {"base": 14, "heading": 20}},
            "spacing": {"unit": 8},
            "radius": 6
        }),
        "dark-ops" => json!({
            "color": {"primary": "#22d3ee", "background": "#0f172a", "text": "#e2e8f0", "muted": "#94a3b8"},
            "font": {"family": "JetBrains Mono, monospace", "size": {"base": 13, "heading": 18}},
            "spacing": {"unit": 6},
            "radius": 2
        }),
        "vibrant" => json!({
            "color": {"primary": "#db2777", "background": "#fdf4ff", "text": "#1f2937", "muted": "#a855f7"},
            "font": {"family": "Poppins, sans-serif", "size": {"base": 15, "heading": 24}},
            "spacing": {"unit": 10},
            "radius": 12
        }),
        _ => return None,
    };
    Some(tokens)
}

/// Tokens of a named style bundle
#[must_use]
pub fn style_tokens(bundle_id: &str) -> Option<DesignTokens> {
    bundle_value(bundle_id).and_then(|v| DesignTokens::from_value(v).ok())
}

/// Render a spec for `template` with `mapping` applied
///
/// Components flow left to right on a `columns`-wide grid. A component
/// bound to a field gets the mapped observed name in `props.field`.
#[must_use]
pub fn render_spec(
    template: &Template,
    mapping: &FieldMapping,
    platform: PlatformType,
    columns: u32,
    gap: u32,
) -> DashboardSpec {
    let mut spec = DashboardSpec::new(template.id, platform.as_str(), SpecLayout::grid(columns, gap));
    let mut grid = GridLayout::new(columns);

    for slot in template.components {
        let position = grid.place(slot.w, slot.h);
        let mut component = Component::new(slot.id, slot.kind, position).with_prop("title", json!(slot.title));

        if let Some(variant) = slot.variant {
            let key = if slot.kind == "chart" { "chartType" } else { "aggregation" };
            component = component.with_prop(key, json!(variant));
        }
        if let Some(observed) = slot.field.and_then(|f| mapping.resolve(f)) {
            component = component.with_prop("field", json!(observed));
        }
        if slot.kind == "table" {
            let columns: Vec<&str> = mapping.mappings.values().map(String::as_str).collect();
            component = component.with_prop("columns", json!(columns));
        }

        spec.components.push(component);
    }

    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::generate_mapping;
    use crate::template::find_template;

    #[test]
    fn every_bundle_has_tokens() {
        for bundle in STYLE_BUNDLES {
            let tokens = style_tokens(bundle).unwrap();
            assert!(tokens.get("color.primary").is_some(), "{bundle}");
        }
        assert!(style_tokens("neon").is_none());
    }

    #[test]
    fn rendered_spec_passes_validation() {
        let template = find_template("voice-call-analytics").unwrap();
        let observed = vec!["callId".to_string(), "duration".to_string(), "cost".to_string()];
        let mapping = generate_mapping(template.required_fields, &observed);

        let spec = render_spec(template, &mapping, PlatformType::Vapi, 12, 16);

        let result = dash_spec::validate(&spec);
        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(spec.template_id, "voice-call-analytics");
        assert_eq!(spec.platform_type, "vapi");
        let kpi = spec.component("total-calls").unwrap();
        assert_eq!(kpi.props["field"], json!("callId"));
    }

    #[test]
    fn narrow_grids_still_fit() {
        for template in crate::template::TEMPLATES {
            let spec = render_spec(template, &FieldMapping::default(), PlatformType::N8n, 5, 4);
            assert!(dash_spec::validate(&spec).valid, "{}", template.id);
        }
    }
}
