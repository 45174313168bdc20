//! Template catalog and the deterministic selection rule table

use serde::{Deserialize, Serialize};

use crate::types::{PlatformCategory, PlatformType};

/// Rule confidence: voice platform with call or message events
pub const CONFIDENCE_VOICE_CALLS: f64 = 0.9;
/// Rule confidence: workflow platform with execution data
pub const CONFIDENCE_WORKFLOW_EXECUTIONS: f64 = 0.9;
/// Rule confidence: workflow platform reporting errors
pub const CONFIDENCE_WORKFLOW_ERRORS: f64 = 0.8;
/// Rule confidence: automation-builder scenarios
pub const CONFIDENCE_AUTOMATION_SCENARIOS: f64 = 0.8;
/// Rule confidence: voice platform without call events
pub const CONFIDENCE_VOICE_OVERVIEW: f64 = 0.7;
/// Confidence of the default fallback template
pub const CONFIDENCE_DEFAULT: f64 = 0.5;
/// Confidence of an explicitly requested template
pub const CONFIDENCE_EXPLICIT: f64 = 1.0;

pub const DEFAULT_TEMPLATE_ID: &str = "general-analytics";

/// Component slot in a template blueprint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentBlueprint {
    pub id: &'static str,
    pub kind: &'static str,
    pub title: &'static str,
    pub w: u32,
    pub h: u32,
    /// Required field whose mapped name feeds this component
    pub field: Option<&'static str>,
    /// Aggregation or chart style
    pub variant: Option<&'static str>,
}

/// Dashboard template
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub required_fields: &'static [&'static str],
    pub components: &'static [ComponentBlueprint],
}

const fn slot(
    id: &'static str,
    kind: &'static str,
    title: &'static str,
    (w, h): (u32, u32),
    field: Option<&'static str>,
    variant: Option<&'static str>,
) -> ComponentBlueprint {
    ComponentBlueprint {
        id,
        kind,
        title,
        w,
        h,
        field,
        variant,
    }
}

pub static TEMPLATES: &[Template] = &[
    Template {
        id: "voice-call-analytics",
        name: "Voice Call Analytics",
        required_fields: &["call_id", "duration", "cost"],
        components: &[
            slot("total-calls", "kpi", "Total Calls", (4, 2), Some("call_id"), Some("count")),
            slot("avg-duration", "kpi", "Avg Duration", (4, 2), Some("duration"), Some("avg")),
            slot("total-cost", "kpi", "Total Cost", (4, 2), Some("cost"), Some("sum")),
            slot("calls-over-time", "chart", "Calls Over Time", (8, 4), Some("call_id"), Some("line")),
            slot("call-outcomes", "chart", "Call Outcomes", (4, 4), None, Some("pie")),
            slot("recent-calls", "table", "Recent Calls", (12, 5), None, None),
        ],
    },
    Template {
        id: "voice-agent-overview",
        name: "Voice Agent Overview",
        required_fields: &["duration"],
        components: &[
            slot("total-events", "kpi", "Total Events", (6, 2), None, Some("count")),
            slot("avg-duration", "kpi", "Avg Duration", (6, 2), Some("duration"), Some("avg")),
            slot("events-over-time", "chart", "Events Over Time", (12, 4), None, Some("line")),
            slot("recent-events", "table", "Recent Events", (12, 5), None, None),
        ],
    },
    Template {
        id: "workflow-execution-monitor",
        name: "Workflow Execution Monitor",
        required_fields: &["execution_id", "workflow_id"],
        components: &[
            slot("total-executions", "kpi", "Executions", (4, 2), Some("execution_id"), Some("count")),
            slot("workflows", "kpi", "Active Workflows", (4, 2), Some("workflow_id"), Some("distinct")),
            slot("success-rate", "kpi", "Success Rate", (4, 2), None, Some("rate")),
            slot("executions-over-time", "chart", "Executions Over Time", (12, 4), Some("execution_id"), Some("line")),
            slot("recent-executions", "table", "Recent Executions", (12, 5), None, None),
        ],
    },
    Template {
        id: "workflow-error-triage",
        name: "Workflow Error Triage",
        required_fields: &["execution_id", "workflow_id", "error"],
        components: &[
            slot("error-count", "kpi", "Errors", (6, 2), Some("error"), Some("count")),
            slot("affected-workflows", "kpi", "Affected Workflows", (6, 2), Some("workflow_id"), Some("distinct")),
            slot("errors-by-workflow", "chart", "Errors by Workflow", (12, 4), Some("workflow_id"), Some("bar")),
            slot("error-log", "table", "Error Log", (12, 5), Some("error"), None),
        ],
    },
    Template {
        id: "automation-scenario-ops",
        name: "Automation Scenario Operations",
        required_fields: &["scenario_id", "operations"],
        components: &[
            slot("scenario-runs", "kpi", "Scenario Runs", (4, 2), Some("scenario_id"), Some("count")),
            slot("operations-used", "kpi", "Operations Used", (4, 2), Some("operations"), Some("sum")),
            slot("run-status", "chart", "Run Status", (4, 4), None, Some("pie")),
            slot("operations-over-time", "chart", "Operations Over Time", (12, 4), Some("operations"), Some("line")),
            slot("recent-runs", "table", "Recent Runs", (12, 5), None, None),
        ],
    },
    Template {
        id: DEFAULT_TEMPLATE_ID,
        name: "General Analytics",
        required_fields: &[],
        components: &[
            slot("total-events", "kpi", "Total Events", (12, 2), None, Some("count")),
            slot("events-over-time", "chart", "Events Over Time", (12, 4), None, Some("line")),
            slot("recent-events", "table", "Recent Events", (12, 5), None, None),
        ],
    },
];

/// Look up a template by id
#[must_use]
pub fn find_template(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// Chosen template with its justification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSelection {
    pub template_id: String,
    pub confidence: f64,
    pub reason: String,
}

/// Event-type categories the rule table keys on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCategories {
    pub calls: bool,
    pub messages: bool,
    pub errors: bool,
}

impl EventCategories {
    #[must_use]
    pub fn from_event_types<S: AsRef<str>>(event_types: &[S]) -> Self {
        let mut categories = Self::default();
        for kind in event_types {
            let kind = kind.as_ref().to_ascii_lowercase();
            categories.calls |= kind.contains("call");
            categories.messages |= kind.contains("message") || kind.contains("transcript");
            categories.errors |= kind.contains("error") || kind.contains("fail");
        }
        categories
    }
}

struct Rule {
    applies: fn(PlatformCategory, EventCategories) -> bool,
    template_id: &'static str,
    confidence: f64,
    reason: &'static str,
}

/// First matching rule wins
static RULES: &[Rule] = &[
    Rule {
        applies: |p, c| p == PlatformCategory::VoiceAgent && (c.calls || c.messages),
        template_id: "voice-call-analytics",
        confidence: CONFIDENCE_VOICE_CALLS,
        reason: "voice platform with call or message events",
    },
    Rule {
        applies: |p, c| p == PlatformCategory::WorkflowAutomation && c.errors,
        template_id: "workflow-error-triage",
        confidence: CONFIDENCE_WORKFLOW_ERRORS,
        reason: "workflow platform reporting failed executions",
    },
    Rule {
        applies: |p, _| p == PlatformCategory::WorkflowAutomation,
        template_id: "workflow-execution-monitor",
        confidence: CONFIDENCE_WORKFLOW_EXECUTIONS,
        reason: "workflow platform with execution events",
    },
    Rule {
        applies: |p, _| p == PlatformCategory::AutomationBuilder,
        template_id: "automation-scenario-ops",
        confidence: CONFIDENCE_AUTOMATION_SCENARIOS,
        reason: "automation builder scenario runs",
    },
    Rule {
        applies: |p, _| p == PlatformCategory::VoiceAgent,
        template_id: "voice-agent-overview",
        confidence: CONFIDENCE_VOICE_OVERVIEW,
        reason: "voice platform without call events yet",
    },
];

/// Pick a template for a platform and its observed event types
#[must_use]
pub fn select_template<S: AsRef<str>>(platform: PlatformType, event_types: &[S]) -> TemplateSelection {
    let categories = EventCategories::from_event_types(event_types);
    let category = platform.category();

    RULES
        .iter()
        .find(|rule| (rule.applies)(category, categories))
        .map_or_else(
            || TemplateSelection {
                template_id: DEFAULT_TEMPLATE_ID.to_string(),
                confidence: CONFIDENCE_DEFAULT,
                reason: "no rule matched; using general analytics".to_string(),
            },
            |rule| TemplateSelection {
                template_id: rule.template_id.to_string(),
                confidence: rule.confidence,
                reason: rule.reason.to_string(),
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_rule_points_at_a_catalog_template() {
        for rule in RULES {
            assert!(find_template(rule.template_id).is_some(), "{}", rule.template_id);
        }
        assert!(find_template(DEFAULT_TEMPLATE_ID).is_some());
    }

    #[test]
    fn blueprints_fit_the_default_grid() {
        for template in TEMPLATES {
            for slot in template.components {
                assert!(slot.w <= 12, "{}:{}", template.id, slot.id);
                if let Some(field) = slot.field {
                    assert!(template.required_fields.contains(&field), "{}:{}", template.id, slot.id);
                }
            }
        }
    }

    #[test]
    fn voice_with_calls() {
        let selection = select_template(PlatformType::Vapi, &["call.ended"]);
        assert_eq!(selection.template_id, "voice-call-analytics");
        assert_eq!(selection.confidence, CONFIDENCE_VOICE_CALLS);
    }

    #[test]
    fn voice_without_calls_falls_to_overview() {
        let selection = select_template(PlatformType::Retell, &["agent.updated"]);
        assert_eq!(selection.template_id, "voice-agent-overview");
    }

    #[test]
    fn workflow_errors_take_precedence() {
        let selection = select_template(PlatformType::N8n, &["execution.success", "execution.error"]);
        assert_eq!(selection.template_id, "workflow-error-triage");
        let selection = select_template(PlatformType::N8n, &["execution.success"]);
        assert_eq!(selection.template_id, "workflow-execution-monitor");
    }

    #[test]
    fn automation_builder() {
        let selection = select_template::<&str>(PlatformType::Make, &[]);
        assert_eq!(selection.template_id, "automation-scenario-ops");
    }
}
