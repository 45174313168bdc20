//! Backfill: pull platform history, store it, mark the schema ready

use std::sync::Arc;

use async_trait::async_trait;
use dash_workflow::{NoResume, RunId, RunRegistry, Step, StepContext, StepError, StepOutcome, Workflow, WorkflowBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{load_or_create_session, Stores, BACKFILL_WORKFLOW};
use crate::audit::AuditRecord;
use crate::config::PipelineConfig;
use crate::event::{normalize, Event};
use crate::journey::JourneyMode;
use crate::schema::{analyze, summary_confidence};
use crate::store::{AuditSink, CredentialProvider, EventStore, FetchRequest, PlatformEventSource, SessionStore};
use crate::types::PlatformType;

/// Audit action recorded for a finished backfill
pub const BACKFILL_AUDIT_ACTION: &str = "backfill.completed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillInput {
    pub source_id: String,
    pub platform_type: PlatformType,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl BackfillInput {
    #[must_use]
    pub fn new(source_id: impl Into<String>, platform_type: PlatformType) -> Self {
        Self {
            source_id: source_id.into(),
            platform_type,
            entity_id: None,
            limit: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fetched {
    pub input: BackfillInput,
    pub payloads: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalized {
    pub input: BackfillInput,
    pub fetched: usize,
    pub events: Vec<Event>,
}

/// Running tally carried through the tail of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillTally {
    pub input: BackfillInput,
    pub fetched: usize,
    pub stored: usize,
    pub skipped: usize,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub schema_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillOutput {
    pub run_id: RunId,
    pub fetched: usize,
    pub stored: usize,
    pub skipped: usize,
    pub schema_ready: bool,
    pub confidence: f64,
}

pub struct FetchPlatformEvents {
    credentials: Arc<dyn CredentialProvider>,
    platform: Arc<dyn PlatformEventSource>,
    config: Arc<PipelineConfig>,
}

#[async_trait]
impl Step for FetchPlatformEvents {
    type Input = BackfillInput;
    type Output = Fetched;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "fetchPlatformEvents"
    }

    async fn execute(&self, input: BackfillInput, ctx: &StepContext<'_, NoResume>) -> Result<StepOutcome<Fetched>, StepError> {
        let credentials = self
            .credentials
            .credentials(&ctx.run().tenant_id, &input.source_id, input.platform_type)
            .await?;
        let request = FetchRequest {
            platform: input.platform_type,
            source_id: input.source_id.clone(),
            entity_id: input.entity_id.clone(),
            limit: input.limit.unwrap_or(self.config.backfill_limit),
        };
        let payloads = self.platform.fetch(&request, &credentials).await?;
        tracing::info!(
            platform = %input.platform_type,
            source = %input.source_id,
            fetched = payloads.len(),
            "platform events fetched"
        );
        Ok(StepOutcome::Complete(Fetched { input, payloads }))
    }
}

pub struct NormalizeEvents;

#[async_trait]
impl Step for NormalizeEvents {
    type Input = Fetched;
    type Output = Normalized;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "normalizeEvents"
    }

    async fn execute(&self, fetched: Fetched, ctx: &StepContext<'_, NoResume>) -> Result<StepOutcome<Normalized>, StepError> {
        let events = normalize(
            &ctx.run().tenant_id,
            &fetched.input.source_id,
            fetched.input.platform_type,
            &fetched.payloads,
        );
        Ok(StepOutcome::Complete(Normalized {
            fetched: fetched.payloads.len(),
            input: fetched.input,
            events,
        }))
    }
}

pub struct StoreEvents {
    events: Arc<dyn EventStore>,
}

#[async_trait]
impl Step for StoreEvents {
    type Input = Normalized;
    type Output = BackfillTally;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "storeEvents"
    }

    async fn execute(&self, normalized: Normalized, _ctx: &StepContext<'_, NoResume>) -> Result<StepOutcome<BackfillTally>, StepError> {
        let counts = self.events.upsert_events(normalized.events).await?;
        tracing::debug!(stored = counts.stored, skipped = counts.skipped, "events stored");
        Ok(StepOutcome::Complete(BackfillTally {
            input: normalized.input,
            fetched: normalized.fetched,
            stored: counts.stored,
            skipped: counts.skipped,
            confidence: 0.0,
            schema_ready: false,
        }))
    }
}

pub struct GenerateSchemaSummaryFromEvents {
    events: Arc<dyn EventStore>,
    config: Arc<PipelineConfig>,
}

#[async_trait]
impl Step for GenerateSchemaSummaryFromEvents {
    type Input = BackfillTally;
    type Output = BackfillTally;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "generateSchemaSummaryFromEvents"
    }

    async fn execute(&self, mut tally: BackfillTally, ctx: &StepContext<'_, NoResume>) -> Result<StepOutcome<BackfillTally>, StepError> {
        let tenant_id = &ctx.run().tenant_id;
        let sample = self
            .events
            .recent_events(tenant_id, &tally.input.source_id, self.config.schema_sample_size)
            .await?;

        let mut summary = analyze(&sample);
        summary.confidence = summary_confidence(
            summary.event_count,
            summary.fields.len(),
            self.config.summary_target_sample,
            self.config.summary_target_fields,
        );
        tally.confidence = summary.confidence;

        tracing::debug!(
            events = summary.event_count,
            fields = summary.fields.len(),
            confidence = summary.confidence,
            "schema summary generated"
        );
        self.events
            .save_schema_summary(tenant_id, &tally.input.source_id, summary)
            .await?;
        Ok(StepOutcome::Complete(tally))
    }
}

pub struct UpdateJourneyReadiness {
    events: Arc<dyn EventStore>,
    sessions: Arc<dyn SessionStore>,
    config: Arc<PipelineConfig>,
}

#[async_trait]
impl Step for UpdateJourneyReadiness {
    type Input = BackfillTally;
    type Output = BackfillTally;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "updateJourneyReadiness"
    }

    async fn execute(&self, mut tally: BackfillTally, ctx: &StepContext<'_, NoResume>) -> Result<StepOutcome<BackfillTally>, StepError> {
        let stored_total = self
            .events
            .count_events(&ctx.run().tenant_id, &tally.input.source_id)
            .await?;
        let ready = stored_total >= self.config.min_ready_events;

        let mut session = load_or_create_session(self.sessions.as_ref(), ctx.run()).await?;
        session.bind_source(tally.input.platform_type, tally.input.source_id.clone(), tally.input.entity_id.clone());
        session.set_schema_ready(ready);
        session.advance_to(JourneyMode::Recommend);
        self.sessions.save_session(session).await?;

        tracing::info!(source = %tally.input.source_id, stored_total, schema_ready = ready, "journey readiness updated");
        tally.schema_ready = ready;
        Ok(StepOutcome::Complete(tally))
    }
}

pub struct LogBackfillEvent {
    audit: Arc<dyn AuditSink>,
}

#[async_trait]
impl Step for LogBackfillEvent {
    type Input = BackfillTally;
    type Output = BackfillOutput;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "logBackfillEvent"
    }

    async fn execute(&self, tally: BackfillTally, ctx: &StepContext<'_, NoResume>) -> Result<StepOutcome<BackfillOutput>, StepError> {
        let record = AuditRecord::new(ctx.run().tenant_id.clone(), BACKFILL_AUDIT_ACTION, &tally.input.source_id).with_detail(json!({
            "platformType": tally.input.platform_type,
            "fetched": tally.fetched,
            "stored": tally.stored,
            "skipped": tally.skipped,
            "schemaReady": tally.schema_ready,
        }));
        if let Err(e) = self.audit.record(record).await {
            tracing::warn!(error = %e, "backfill audit entry not recorded");
        }

        Ok(StepOutcome::Complete(BackfillOutput {
            run_id: ctx.run().run_id,
            fetched: tally.fetched,
            stored: tally.stored,
            skipped: tally.skipped,
            schema_ready: tally.schema_ready,
            confidence: tally.confidence,
        }))
    }
}

pub(crate) fn build(
    stores: &Stores,
    config: Arc<PipelineConfig>,
    runs: Arc<RunRegistry>,
) -> Workflow<BackfillInput, BackfillOutput> {
    WorkflowBuilder::new(BACKFILL_WORKFLOW)
        .then(FetchPlatformEvents {
            credentials: stores.credentials.clone(),
            platform: stores.platform.clone(),
            config: config.clone(),
        })
        .then(NormalizeEvents)
        .then(StoreEvents {
            events: stores.events.clone(),
        })
        .then(GenerateSchemaSummaryFromEvents {
            events: stores.events.clone(),
            config: config.clone(),
        })
        .then(UpdateJourneyReadiness {
            events: stores.events.clone(),
            sessions: stores.sessions.clone(),
            config,
        })
        .then(LogBackfillEvent {
            audit: stores.audit.clone(),
        })
        .build_with_registry(runs)
}
