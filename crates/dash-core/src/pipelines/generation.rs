//! Dashboard generation: schema analysis through preview persistence
//!
//! `checkMappingCompleteness` is the human-in-the-loop point. When required
//! fields cannot be matched the run suspends with the missing list; the
//! caller resumes with a [`MappingResolution`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dash_spec::{DashboardSpec, DesignTokens, SpecValidator, ValidationResult};
use dash_workflow::{
    NoResume, RunId, RunRegistry, Step, StepContext, StepError, StepOutcome, Workflow, WorkflowBuilder,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{load_or_create_session, session_key, Stores, GENERATION_WORKFLOW};
use crate::config::PipelineConfig;
use crate::journey::JourneyMode;
use crate::mapping::{generate_mapping, FieldMapping};
use crate::render::{render_spec, style_tokens};
use crate::schema::{analyze, SchemaSummary};
use crate::store::{EventStore, SessionStore, SpecStore};
use crate::template::{find_template, select_template, Template, TemplateSelection, CONFIDENCE_EXPLICIT};
use crate::types::{Interface, InterfaceId, InterfaceVersion, PlatformType, VersionId};

/// Precondition code when mapping runs before backfill made the schema ready
pub const SCHEMA_NOT_READY: &str = "SCHEMA_NOT_READY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationInput {
    pub source_id: String,
    pub platform_type: PlatformType,
    /// Existing interface to add a version to; a new one is created otherwise
    #[serde(default)]
    pub interface_id: Option<InterfaceId>,
    #[serde(default)]
    pub interface_name: Option<String>,
    /// Skip rule-based selection
    #[serde(default)]
    pub template_id: Option<String>,
    /// Style bundle to render with; the session's selection otherwise
    #[serde(default)]
    pub style_bundle_id: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub storyboard: Option<String>,
}

impl GenerationInput {
    #[must_use]
    pub fn new(source_id: impl Into<String>, platform_type: PlatformType) -> Self {
        Self {
            source_id: source_id.into(),
            platform_type,
            interface_id: None,
            interface_name: None,
            template_id: None,
            style_bundle_id: None,
            outcome: None,
            storyboard: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_interface(mut self, interface_id: InterfaceId) -> Self {
        self.interface_id = Some(interface_id);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.interface_name = Some(name.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_style_bundle(mut self, bundle_id: impl Into<String>) -> Self {
        self.style_bundle_id = Some(bundle_id.into());
        self
    }

    /// Outcome and storyboard chosen during the recommend phase
    #[inline]
    #[must_use]
    pub fn with_story(mut self, outcome: impl Into<String>, storyboard: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self.storyboard = Some(storyboard.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaAnalyzed {
    pub input: GenerationInput,
    pub schema: SchemaSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateChosen {
    pub input: GenerationInput,
    pub available_fields: Vec<String>,
    pub selection: TemplateSelection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDraft {
    pub input: GenerationInput,
    pub available_fields: Vec<String>,
    pub selection: TemplateSelection,
    pub mapping: FieldMapping,
}

/// Operator answer to a mapping suspension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingResolution {
    /// Required field -> observed field
    pub mappings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecDraft {
    pub input: GenerationInput,
    pub selection: TemplateSelection,
    pub mapping: FieldMapping,
    pub style_bundle_id: String,
    pub spec: DashboardSpec,
    pub tokens: DesignTokens,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedSpec {
    pub draft: SpecDraft,
    pub validation: ValidationResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPersisted {
    pub interface_id: InterfaceId,
    pub version_id: VersionId,
    pub template_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutput {
    pub run_id: RunId,
    pub interface_id: InterfaceId,
    pub preview_version_id: VersionId,
    pub preview_url: String,
}

fn template_for(selection: &TemplateSelection) -> Result<&'static Template, StepError> {
    find_template(&selection.template_id)
        .ok_or_else(|| StepError::not_found(format!("template not found: {}", selection.template_id)))
}

pub struct AnalyzeSchema {
    events: Arc<dyn EventStore>,
    config: Arc<PipelineConfig>,
}

#[async_trait]
impl Step for AnalyzeSchema {
    type Input = GenerationInput;
    type Output = SchemaAnalyzed;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "analyzeSchema"
    }

    async fn execute(
        &self,
        input: GenerationInput,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<SchemaAnalyzed>, StepError> {
        let sample = self
            .events
            .recent_events(&ctx.run().tenant_id, &input.source_id, self.config.schema_sample_size)
            .await?;
        let schema = analyze(&sample);
        tracing::debug!(
            source = %input.source_id,
            sampled = sample.len(),
            fields = schema.fields.len(),
            "schema analyzed"
        );
        Ok(StepOutcome::Complete(SchemaAnalyzed { input, schema }))
    }
}

pub struct SelectTemplate;

#[async_trait]
impl Step for SelectTemplate {
    type Input = SchemaAnalyzed;
    type Output = TemplateChosen;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "selectTemplate"
    }

    async fn execute(
        &self,
        analyzed: SchemaAnalyzed,
        _ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<TemplateChosen>, StepError> {
        let selection = match &analyzed.input.template_id {
            Some(id) => {
                let template = find_template(id).ok_or_else(|| StepError::not_found(format!("template not found: {id}")))?;
                TemplateSelection {
                    template_id: template.id.to_string(),
                    confidence: CONFIDENCE_EXPLICIT,
                    reason: "template requested explicitly".to_string(),
                }
            }
            None => select_template(analyzed.input.platform_type, &analyzed.schema.event_types),
        };
        tracing::info!(
            template = %selection.template_id,
            confidence = selection.confidence,
            reason = %selection.reason,
            "template selected"
        );

        Ok(StepOutcome::Complete(TemplateChosen {
            available_fields: analyzed.schema.field_names(),
            input: analyzed.input,
            selection,
        }))
    }
}

pub struct GenerateMapping {
    sessions: Arc<dyn SessionStore>,
    config: Arc<PipelineConfig>,
}

#[async_trait]
impl Step for GenerateMapping {
    type Input = TemplateChosen;
    type Output = MappingDraft;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "generateMapping"
    }

    async fn execute(
        &self,
        chosen: TemplateChosen,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<MappingDraft>, StepError> {
        let ready = self
            .sessions
            .session(&session_key(ctx.run()))
            .await?
            .is_some_and(|s| s.schema_ready_for(&chosen.input.source_id));
        if !ready {
            return Err(StepError::precondition(
                SCHEMA_NOT_READY,
                format!("schema for source {} is not ready; run a backfill first", chosen.input.source_id),
            ));
        }

        let template = template_for(&chosen.selection)?;
        let mapping = generate_mapping(template.required_fields, &chosen.available_fields);
        if mapping.confidence < self.config.mapping_confidence_floor {
            tracing::warn!(
                template = template.id,
                confidence = mapping.confidence,
                missing = ?mapping.missing_fields,
                "mapping confidence below floor"
            );
        }

        Ok(StepOutcome::Complete(MappingDraft {
            input: chosen.input,
            available_fields: chosen.available_fields,
            selection: chosen.selection,
            mapping,
        }))
    }
}

pub struct CheckMappingCompleteness;

#[async_trait]
impl Step for CheckMappingCompleteness {
    type Input = MappingDraft;
    type Output = MappingDraft;
    type Resume = MappingResolution;

    fn id(&self) -> &'static str {
        "checkMappingCompleteness"
    }

    async fn execute(
        &self,
        mut draft: MappingDraft,
        ctx: &StepContext<'_, MappingResolution>,
    ) -> Result<StepOutcome<MappingDraft>, StepError> {
        if let Some(resolution) = ctx.resume_data() {
            let template = template_for(&draft.selection)?;
            let rejected =
                draft
                    .mapping
                    .merge_overrides(template.required_fields, &draft.available_fields, &resolution.mappings);
            if !rejected.is_empty() {
                tracing::warn!(?rejected, "ignored mappings for unknown fields");
            }
        }

        if draft.mapping.is_complete() {
            return Ok(StepOutcome::Complete(draft));
        }

        Ok(StepOutcome::suspend(
            "required fields could not be mapped",
            json!({
                "missingFields": draft.mapping.missing_fields,
                "mappings": draft.mapping.mappings,
                "availableFields": draft.available_fields,
            }),
        ))
    }
}

pub struct GenerateUiSpec {
    sessions: Arc<dyn SessionStore>,
    config: Arc<PipelineConfig>,
}

#[async_trait]
impl Step for GenerateUiSpec {
    type Input = MappingDraft;
    type Output = SpecDraft;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "generateUISpec"
    }

    async fn execute(
        &self,
        draft: MappingDraft,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<SpecDraft>, StepError> {
        let template = template_for(&draft.selection)?;
        let selected = match &draft.input.style_bundle_id {
            Some(id) => Some(id.clone()),
            None => self
                .sessions
                .session(&session_key(ctx.run()))
                .await?
                .and_then(|s| s.selected_style_bundle_id),
        };

        let default_bundle = &self.config.default_style_bundle;
        let (style_bundle_id, tokens) = match selected.as_deref().and_then(|id| style_tokens(id).map(|t| (id, t))) {
            Some((id, tokens)) => (id.to_string(), tokens),
            None => {
                if let Some(unknown) = &selected {
                    tracing::warn!(bundle = %unknown, "unknown style bundle, using default");
                }
                let tokens = style_tokens(default_bundle)
                    .ok_or_else(|| StepError::internal(format!("default style bundle {default_bundle} is unknown")))?;
                (default_bundle.clone(), tokens)
            }
        };

        let spec = render_spec(
            template,
            &draft.mapping,
            draft.input.platform_type,
            self.config.grid_columns,
            self.config.grid_gap,
        );

        Ok(StepOutcome::Complete(SpecDraft {
            input: draft.input,
            selection: draft.selection,
            mapping: draft.mapping,
            style_bundle_id,
            spec,
            tokens,
        }))
    }
}

pub struct ValidateSpec {
    validator: SpecValidator,
}

#[async_trait]
impl Step for ValidateSpec {
    type Input = SpecDraft;
    type Output = ValidatedSpec;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "validateSpec"
    }

    async fn execute(
        &self,
        draft: SpecDraft,
        _ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<ValidatedSpec>, StepError> {
        match self.validator.check(&draft.spec) {
            Ok(validation) => Ok(StepOutcome::Complete(ValidatedSpec { draft, validation })),
            Err(gate) => {
                let message = gate.to_string();
                Err(StepError::validation_gate(gate.errors, gate.score, message))
            }
        }
    }
}

pub struct PersistPreviewVersion {
    specs: Arc<dyn SpecStore>,
    sessions: Arc<dyn SessionStore>,
}

#[async_trait]
impl Step for PersistPreviewVersion {
    type Input = ValidatedSpec;
    type Output = PreviewPersisted;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "persistPreviewVersion"
    }

    async fn execute(
        &self,
        validated: ValidatedSpec,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<PreviewPersisted>, StepError> {
        let tenant_id = &ctx.run().tenant_id;
        let draft = validated.draft;
        let mut session = load_or_create_session(self.sessions.as_ref(), ctx.run()).await?;

        let (interface_id, created) = match draft.input.interface_id {
            Some(id) => {
                let existing = self
                    .specs
                    .interface(tenant_id, id)
                    .await?
                    .ok_or_else(|| StepError::not_found(format!("interface not found: {id}")))?;
                (existing.id, false)
            }
            None => {
                let name = match &draft.input.interface_name {
                    Some(name) => name.clone(),
                    None => template_for(&draft.selection)?.name.to_string(),
                };
                let interface = Interface::draft(tenant_id.clone(), name);
                let id = interface.id;
                self.specs.create_interface(interface).await?;
                tracing::info!(interface = %id, "interface created");
                (id, true)
            }
        };
        let created = created.then_some(interface_id);

        let version = InterfaceVersion::new(interface_id, draft.spec, draft.tokens);
        let version_id = version.id;
        if let Err(e) = self.specs.append_version(version).await {
            self.roll_back(tenant_id, created, None).await;
            return Err(StepError::from(e));
        }

        session.select_style_bundle(draft.style_bundle_id);
        if let Some(outcome) = draft.input.outcome {
            session.select_outcome(outcome);
        }
        if let Some(storyboard) = draft.input.storyboard {
            session.select_storyboard(storyboard);
        }
        session.set_preview(interface_id, version_id);
        session.set_mode(JourneyMode::BuildPreview);
        if let Err(e) = self.sessions.save_session(session).await {
            self.roll_back(tenant_id, created, Some(version_id)).await;
            return Err(StepError::from(e));
        }

        tracing::info!(interface = %interface_id, version = %version_id, "preview version persisted");
        Ok(StepOutcome::Complete(PreviewPersisted {
            interface_id,
            version_id,
            template_id: draft.selection.template_id,
        }))
    }
}

impl PersistPreviewVersion {
    /// Remove what this step wrote before a later write failed
    async fn roll_back(&self, tenant_id: &str, created: Option<InterfaceId>, version_id: Option<VersionId>) {
        if let Some(version_id) = version_id {
            if let Err(e) = self.specs.discard_version(version_id).await {
                tracing::error!(version = %version_id, error = %e, "preview version left behind");
            }
        }
        if let Some(interface_id) = created {
            if let Err(e) = self.specs.discard_interface(tenant_id, interface_id).await {
                tracing::error!(interface = %interface_id, error = %e, "draft interface left behind");
            }
        }
        tracing::warn!(?created, ?version_id, "preview persistence rolled back");
    }
}

pub struct Finalize {
    config: Arc<PipelineConfig>,
}

#[async_trait]
impl Step for Finalize {
    type Input = PreviewPersisted;
    type Output = GenerationOutput;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "finalize"
    }

    async fn execute(
        &self,
        persisted: PreviewPersisted,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<GenerationOutput>, StepError> {
        let preview_url = format!(
            "{}/{}?version={}",
            self.config.preview_base_url.trim_end_matches('/'),
            persisted.interface_id,
            persisted.version_id
        );
        Ok(StepOutcome::Complete(GenerationOutput {
            run_id: ctx.run().run_id,
            interface_id: persisted.interface_id,
            preview_version_id: persisted.version_id,
            preview_url,
        }))
    }
}

pub(crate) fn build(
    stores: &Stores,
    config: Arc<PipelineConfig>,
    runs: Arc<RunRegistry>,
) -> Workflow<GenerationInput, GenerationOutput> {
    WorkflowBuilder::new(GENERATION_WORKFLOW)
        .then(AnalyzeSchema {
            events: stores.events.clone(),
            config: config.clone(),
        })
        .then(SelectTemplate)
        .then(GenerateMapping {
            sessions: stores.sessions.clone(),
            config: config.clone(),
        })
        .then(CheckMappingCompleteness)
        .then(GenerateUiSpec {
            sessions: stores.sessions.clone(),
            config: config.clone(),
        })
        .then(ValidateSpec {
            validator: SpecValidator::with_threshold(config.validation_gate_threshold),
        })
        .then(PersistPreviewVersion {
            specs: stores.specs.clone(),
            sessions: stores.sessions.clone(),
        })
        .then(Finalize { config })
        .build_with_registry(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journey::SessionKey;
    use crate::render::DEFAULT_STYLE_BUNDLE;
    use crate::store::MemoryStore;
    use dash_spec::{Component, GridPosition, SpecLayout, DEFAULT_GATE_THRESHOLD};
    use dash_workflow::{RunOutcome, RunScope, RunStatus};

    fn draft_with(components: Vec<Component>) -> SpecDraft {
        let mut spec = DashboardSpec::new("voice-call-analytics", "vapi", SpecLayout::grid(12, 16));
        spec.components = components;
        SpecDraft {
            input: GenerationInput::new("src", PlatformType::Vapi),
            selection: TemplateSelection {
                template_id: "voice-call-analytics".to_string(),
                confidence: CONFIDENCE_EXPLICIT,
                reason: "fixed".to_string(),
            },
            mapping: FieldMapping::default(),
            style_bundle_id: DEFAULT_STYLE_BUNDLE.to_string(),
            spec,
            tokens: DesignTokens::new(),
        }
    }

    fn validate_then_persist(store: &Arc<MemoryStore>) -> Workflow<SpecDraft, PreviewPersisted> {
        WorkflowBuilder::new(GENERATION_WORKFLOW)
            .then(ValidateSpec {
                validator: SpecValidator::with_threshold(DEFAULT_GATE_THRESHOLD),
            })
            .then(PersistPreviewVersion {
                specs: store.clone(),
                sessions: store.clone(),
            })
            .build()
    }

    #[tokio::test]
    async fn failed_gate_stops_before_persisting() {
        let store = Arc::new(MemoryStore::new());
        let workflow = validate_then_persist(&store);
        let overflowing = Component::new("kpi-1", "kpi", GridPosition::new(10, 0, 4, 2));

        let outcome = workflow
            .execute(RunScope::new("t", "th"), draft_with(vec![overflowing]))
            .await
            .unwrap();

        assert_eq!(outcome.status(), RunStatus::Failed);
        assert_eq!(outcome.error().unwrap().kind_code(), "VALIDATION_GATE");
        let RunOutcome::Failed { step_id, .. } = &outcome else {
            panic!("expected a failed run");
        };
        assert_eq!(step_id, "validateSpec");
        assert_eq!(store.interface_count(), 0);
        assert_eq!(store.version_count(), 0);
        assert!(store.session(&SessionKey::new("t", "th")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn passing_gate_persists_one_version() {
        let store = Arc::new(MemoryStore::new());
        let workflow = validate_then_persist(&store);
        let fitting = Component::new("kpi-1", "kpi", GridPosition::new(0, 0, 4, 2));

        let outcome = workflow
            .execute(RunScope::new("t", "th"), draft_with(vec![fitting]))
            .await
            .unwrap();

        assert_eq!(outcome.status(), RunStatus::Success);
        assert_eq!(store.interface_count(), 1);
        assert_eq!(store.version_count(), 1);
        let session = store.session(&SessionKey::new("t", "th")).await.unwrap().unwrap();
        assert_eq!(session.selected_style_bundle_id.as_deref(), Some(DEFAULT_STYLE_BUNDLE));
        assert_eq!(session.mode, JourneyMode::BuildPreview);
    }
}
