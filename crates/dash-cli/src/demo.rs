//! Full pipeline chain over bundled sample telemetry
//!
//! Backfills a handful of voice-call events that lack a `call_id` field, so
//! generation suspends for a mapping; the demo answers with `call_id -> id`,
//! then deploys the preview.

use std::sync::Arc;

use anyhow::{bail, Context};
use dash_core::{
    BackfillInput, DeployInput, GenerationInput, MemoryAuditLog, MemoryStore, PipelineConfig, Pipelines, PlatformType,
    StaticCredentials, StaticEventSource, Stores,
};
use dash_workflow::{RunOutcome, RunScope, RunStatus};
use serde::Serialize;
use serde_json::{json, Value};

const DEMO_TENANT: &str = "demo-tenant";
const DEMO_THREAD: &str = "demo-thread";
const DEMO_SOURCE: &str = "demo-vapi";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoReport {
    pub backfill: Value,
    pub suspension: Option<Value>,
    pub generation: Value,
    pub deployment: Value,
    pub audit_entries: usize,
}

fn sample_payloads() -> Vec<Value> {
    (0..8)
        .map(|i| {
            json!({
                "id": format!("demo-call-{i}"),
                "type": if i % 4 == 0 { "call.failed" } else { "call.ended" },
                "duration": 45 + i * 7,
                "cost": 0.04 + f64::from(i) * 0.01,
                "status": if i % 4 == 0 { "failed" } else { "completed" },
                "timestamp": 1_700_000_000_000_i64 + i64::from(i) * 60_000,
            })
        })
        .collect()
}

fn finished<O: Serialize>(stage: &str, outcome: RunOutcome<O>) -> anyhow::Result<Value> {
    match outcome.status() {
        RunStatus::Success => Ok(serde_json::to_value(outcome.into_output())?),
        status => {
            let error = outcome.error().map(ToString::to_string).unwrap_or_default();
            bail!("{stage} ended {status}: {error}")
        }
    }
}

/// Run backfill, generation and deployment end to end in memory
///
/// # Errors
/// Fails if any stage ends in a state other than success
pub async fn run_demo(config: PipelineConfig) -> anyhow::Result<DemoReport> {
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let source = Arc::new(StaticEventSource::new().with_payloads(DEMO_SOURCE, sample_payloads()));
    let credentials = Arc::new(StaticCredentials::new().with_secret(DEMO_TENANT, DEMO_SOURCE, "demo-key"));
    let stores = Stores::in_memory(store, audit.clone(), source, credentials);
    let pipelines = Pipelines::new(&stores, config)?;
    let scope = RunScope::new(DEMO_TENANT, DEMO_THREAD);

    tracing::info!("running backfill");
    let backfill = pipelines
        .backfill
        .execute(scope.clone(), BackfillInput::new(DEMO_SOURCE, PlatformType::Vapi))
        .await?;
    let backfill = finished("backfill", backfill)?;

    tracing::info!("running generation");
    let mut generation = pipelines
        .generation
        .execute(scope.clone(), GenerationInput::new(DEMO_SOURCE, PlatformType::Vapi))
        .await?;
    let mut suspension = None;
    if generation.status() == RunStatus::Suspended {
        let payload = generation
            .suspension()
            .map(|s| s.payload.clone())
            .unwrap_or_default();
        tracing::info!(run = %generation.run_id(), missing = %payload["missingFields"], "generation suspended, supplying mapping");
        generation = pipelines
            .generation
            .resume(generation.run_id(), json!({"mappings": {"call_id": "id"}}))
            .await?;
        suspension = Some(payload);
    }
    let generation = finished("generation", generation)?;

    let interface_id = serde_json::from_value(generation["interfaceId"].clone()).context("generation output")?;
    let version_id = serde_json::from_value(generation["previewVersionId"].clone()).context("generation output")?;

    tracing::info!("running deployment");
    let deployment = pipelines
        .deployment
        .execute(scope, DeployInput::new(interface_id, version_id, true))
        .await?;
    let deployment = finished("deployment", deployment)?;

    audit.verify_integrity()?;
    Ok(DemoReport {
        backfill,
        suspension,
        generation,
        deployment,
        audit_entries: audit.entries().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn demo_runs_to_deployment() {
        let report = run_demo(PipelineConfig::default()).await.unwrap();

        assert_eq!(report.backfill["stored"], json!(8));
        assert_eq!(report.suspension.unwrap()["missingFields"], json!(["call_id"]));
        assert!(report.deployment["portalUrl"]
            .as_str()
            .unwrap()
            .contains(DEMO_TENANT));
        assert_eq!(report.audit_entries, 2);
    }
}
