//! Testing utilities for the Dashforge workspace
//!
//! Shared fixtures: sample specs, raw platform payloads, and a harness
//! wiring every pipeline to in-memory stores.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dash_core::{
    AuditRecord, AuditSink, Deployment, DeploymentStore, InterfaceId, JourneySession, MemoryAuditLog, MemoryStore,
    PipelineConfig, Pipelines, PublicationPlan, PublicationReceipt, SessionKey, SessionStore, SpecStore,
    StaticCredentials, StaticEventSource, StoreError, StoreResult, Stores,
};
use dash_spec::{Component, DashboardSpec, GridPosition, SpecLayout};
use dash_workflow::RunScope;
use serde_json::{json, Value};

pub const TENANT: &str = "tenant-test";
pub const THREAD: &str = "thread-test";
pub const SOURCE: &str = "source-test";

/// Small valid spec on a 12-column grid
pub fn sample_spec() -> DashboardSpec {
    let mut spec = DashboardSpec::new("voice-call-analytics", "vapi", SpecLayout::grid(12, 16));
    spec.components = vec![
        Component::new("total-calls", "kpi", GridPosition::new(0, 0, 4, 2)).with_prop("title", json!("Total Calls")),
        Component::new("avg-duration", "kpi", GridPosition::new(4, 0, 4, 2)).with_prop("title", json!("Avg Duration")),
        Component::new("recent-calls", "table", GridPosition::new(0, 2, 12, 5)),
    ];
    spec
}

/// Raw spec with one component crossing the right edge
pub fn overflowing_spec_value() -> Value {
    json!({
        "version": "1.0",
        "templateId": "voice-call-analytics",
        "platformType": "vapi",
        "layout": {"type": "grid", "columns": 12, "gap": 16},
        "components": [
            {"id": "kpi-1", "type": "kpi", "props": {}, "layout": {"col": 10, "row": 0, "w": 4, "h": 2}}
        ]
    })
}

/// Vapi call payloads carrying every field the call template needs
pub fn vapi_call_payloads(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "id": format!("evt-{i}"),
                "type": "call.ended",
                "call_id": format!("call-{i}"),
                "duration": 30 + i,
                "cost": 0.05,
                "status": "completed",
                "timestamp": 1_700_000_000_000_i64 + i as i64 * 1000,
            })
        })
        .collect()
}

/// Vapi call payloads with no call id field
pub fn vapi_payloads_without_call_id(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "id": format!("evt-{i}"),
                "type": "call.ended",
                "duration": 40 + i,
                "cost": 0.07,
                "timestamp": 1_700_000_000_000_i64 + i as i64 * 1000,
            })
        })
        .collect()
}

/// n8n execution payloads; every third one failed when `with_errors`
pub fn n8n_execution_payloads(count: usize, with_errors: bool) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let failed = with_errors && i % 3 == 0;
            let mut payload = json!({
                "executionId": format!("exec-{i}"),
                "workflow_id": format!("wf-{}", i % 2),
                "workflowName": "sync-crm",
                "type": if failed { "execution.error" } else { "execution.success" },
                "status": if failed { "error" } else { "success" },
                "startedAt": 1_700_000_000_000_i64 + i as i64 * 1000,
            });
            if failed {
                payload["error"] = json!("node timed out");
            }
            payload
        })
        .collect()
}

/// Make scenario run payloads
pub fn make_scenario_payloads(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "id": format!("run-{i}"),
                "scenario_id": "scn-1",
                "scenario_name": "Lead sync",
                "operations": 12 + i,
                "status": "success",
                "timestamp": 1_700_000_000_000_i64 + i as i64 * 1000,
            })
        })
        .collect()
}

/// Audit sink that always fails
#[derive(Debug, Default)]
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn record(&self, _record: AuditRecord) -> StoreResult<u64> {
        Err(StoreError::Backend("audit sink offline".into()))
    }
}

/// Session store that fails to save any session holding a preview
pub struct PreviewRejectingSessions {
    inner: Arc<MemoryStore>,
}

impl PreviewRejectingSessions {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SessionStore for PreviewRejectingSessions {
    async fn session(&self, key: &SessionKey) -> StoreResult<Option<JourneySession>> {
        self.inner.session(key).await
    }

    async fn save_session(&self, session: JourneySession) -> StoreResult<()> {
        if session.preview_version_id.is_some() {
            return Err(StoreError::Backend("session store offline".into()));
        }
        self.inner.save_session(session).await
    }
}

/// Deployment store where a competing deploy of the latest version commits
/// right after the first read of an interface's deployments
pub struct RacingDeployments {
    inner: Arc<MemoryStore>,
    tenant_id: String,
    raced: AtomicBool,
}

impl RacingDeployments {
    pub fn new(inner: Arc<MemoryStore>, tenant_id: impl Into<String>) -> Self {
        Self {
            inner,
            tenant_id: tenant_id.into(),
            raced: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DeploymentStore for RacingDeployments {
    async fn deployments_for(&self, interface_id: InterfaceId) -> StoreResult<Vec<Deployment>> {
        let seen = self.inner.deployments_for(interface_id).await?;
        if !self.raced.swap(true, Ordering::SeqCst) {
            let version = self
                .inner
                .latest_version(interface_id)
                .await?
                .ok_or_else(|| StoreError::not_found("version", interface_id))?;
            let mut competing = PublicationPlan::new(Deployment::active(self.tenant_id.clone(), interface_id, version.id));
            competing.observed_active = seen.iter().filter(|d| d.is_active()).map(|d| d.id).collect();
            self.inner.commit_publication(&competing).await?;
        }
        Ok(seen)
    }

    async fn commit_publication(&self, plan: &PublicationPlan) -> StoreResult<PublicationReceipt> {
        self.inner.commit_publication(plan).await
    }
}

/// Every pipeline wired to in-memory stores
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub source: Arc<StaticEventSource>,
    pub stores: Stores,
    pub pipelines: Pipelines,
}

impl TestHarness {
    /// Harness with `payloads` served for [`SOURCE`]
    pub fn new(payloads: Vec<Value>) -> Self {
        Self::with_config(payloads, PipelineConfig::default())
    }

    pub fn with_config(payloads: Vec<Value>, config: PipelineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let source = Arc::new(StaticEventSource::new().with_payloads(SOURCE, payloads));
        let credentials = Arc::new(StaticCredentials::new().with_secret(TENANT, SOURCE, "test-key"));
        let stores = Stores::in_memory(store.clone(), audit.clone(), source.clone(), credentials);
        Self::assemble(store, audit, source, stores, config)
    }

    /// Same wiring with the audit sink replaced
    pub fn with_audit_sink(payloads: Vec<Value>, sink: Arc<dyn AuditSink>) -> Self {
        Self::with_stores(payloads, |_, stores| stores.with_audit(sink))
    }

    /// Same wiring with seams swapped by `customize`, which gets the backing store
    pub fn with_stores(payloads: Vec<Value>, customize: impl FnOnce(&Arc<MemoryStore>, Stores) -> Stores) -> Self {
        let harness = Self::new(payloads);
        let stores = customize(&harness.store, harness.stores.clone());
        Self::assemble(harness.store, harness.audit, harness.source, stores, PipelineConfig::default())
    }

    fn assemble(
        store: Arc<MemoryStore>,
        audit: Arc<MemoryAuditLog>,
        source: Arc<StaticEventSource>,
        stores: Stores,
        config: PipelineConfig,
    ) -> Self {
        let pipelines = Pipelines::new(&stores, config).expect("test config is valid");
        Self {
            store,
            audit,
            source,
            stores,
            pipelines,
        }
    }

    pub fn scope(&self) -> RunScope {
        RunScope::new(TENANT, THREAD)
    }
}
