//! In-memory implementations of every store seam

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;

use super::{
    CredentialProvider, Credentials, DeploymentStore, EventStore, FetchRequest, PlatformEventSource,
    PublicationPlan, PublicationReceipt, SessionStore, SpecStore, TodoStore, UpsertCounts,
};
use crate::error::{StoreError, StoreResult};
use crate::event::Event;
use crate::journey::{JourneySession, SessionKey};
use crate::schema::SchemaSummary;
use crate::types::{
    Deployment, DeploymentId, DeploymentStatus, Interface, InterfaceId, InterfaceStatus, InterfaceVersion,
    PlatformType, Todo, TodoStatus, VersionId,
};

#[derive(Debug, Default)]
struct Tables {
    events: Vec<Event>,
    event_keys: HashSet<(String, String)>,
    summaries: HashMap<(String, String), SchemaSummary>,
    interfaces: HashMap<InterfaceId, Interface>,
    /// Append order is the version sequence
    versions: Vec<InterfaceVersion>,
    deployments: Vec<Deployment>,
    sessions: HashMap<SessionKey, JourneySession>,
    todos: Vec<Todo>,
}

/// Every persistence table behind one lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored events across tenants and sources
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.tables.lock().events.len()
    }

    /// Active deployments of an interface
    #[must_use]
    pub fn active_deployments(&self, interface_id: InterfaceId) -> Vec<Deployment> {
        self.tables
            .lock()
            .deployments
            .iter()
            .filter(|d| d.interface_id == interface_id && d.is_active())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn deployment_count(&self) -> usize {
        self.tables.lock().deployments.len()
    }

    #[must_use]
    pub fn interface_count(&self) -> usize {
        self.tables.lock().interfaces.len()
    }

    #[must_use]
    pub fn version_count(&self) -> usize {
        self.tables.lock().versions.len()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn upsert_events(&self, events: Vec<Event>) -> StoreResult<UpsertCounts> {
        let mut tables = self.tables.lock();
        let mut counts = UpsertCounts::default();
        for event in events {
            let key = (event.source_id.clone(), event.platform_event_id.clone());
            if tables.event_keys.insert(key) {
                tables.events.push(event);
                counts.stored += 1;
            } else {
                counts.skipped += 1;
            }
        }
        Ok(counts)
    }

    async fn recent_events(&self, tenant_id: &str, source_id: &str, limit: usize) -> StoreResult<Vec<Event>> {
        let tables = self.tables.lock();
        let mut events: Vec<Event> = tables
            .events
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.source_id == source_id)
            .cloned()
            .collect();
        // stable sort keeps insertion order among equal timestamps
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }

    async fn count_events(&self, tenant_id: &str, source_id: &str) -> StoreResult<usize> {
        Ok(self
            .tables
            .lock()
            .events
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.source_id == source_id)
            .count())
    }

    async fn save_schema_summary(&self, tenant_id: &str, source_id: &str, summary: SchemaSummary) -> StoreResult<()> {
        self.tables
            .lock()
            .summaries
            .insert((tenant_id.to_string(), source_id.to_string()), summary);
        Ok(())
    }

    async fn schema_summary(&self, tenant_id: &str, source_id: &str) -> StoreResult<Option<SchemaSummary>> {
        Ok(self
            .tables
            .lock()
            .summaries
            .get(&(tenant_id.to_string(), source_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl SpecStore for MemoryStore {
    async fn create_interface(&self, interface: Interface) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        if tables.interfaces.contains_key(&interface.id) {
            return Err(StoreError::Conflict(format!("interface {} already exists", interface.id)));
        }
        tables.interfaces.insert(interface.id, interface);
        Ok(())
    }

    async fn interface(&self, tenant_id: &str, id: InterfaceId) -> StoreResult<Option<Interface>> {
        Ok(self
            .tables
            .lock()
            .interfaces
            .get(&id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn append_version(&self, version: InterfaceVersion) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        if !tables.interfaces.contains_key(&version.interface_id) {
            return Err(StoreError::not_found("interface", version.interface_id));
        }
        if tables.versions.iter().any(|v| v.id == version.id) {
            return Err(StoreError::Conflict(format!("version {} already exists", version.id)));
        }
        tables.versions.push(version);
        Ok(())
    }

    async fn version(&self, id: VersionId) -> StoreResult<Option<InterfaceVersion>> {
        Ok(self.tables.lock().versions.iter().find(|v| v.id == id).cloned())
    }

    async fn latest_version(&self, interface_id: InterfaceId) -> StoreResult<Option<InterfaceVersion>> {
        Ok(self
            .tables
            .lock()
            .versions
            .iter()
            .rev()
            .find(|v| v.interface_id == interface_id)
            .cloned())
    }

    async fn list_versions(&self, interface_id: InterfaceId) -> StoreResult<Vec<InterfaceVersion>> {
        Ok(self
            .tables
            .lock()
            .versions
            .iter()
            .filter(|v| v.interface_id == interface_id)
            .cloned()
            .collect())
    }

    async fn discard_version(&self, id: VersionId) -> StoreResult<bool> {
        let mut tables = self.tables.lock();
        let before = tables.versions.len();
        tables.versions.retain(|v| v.id != id);
        Ok(tables.versions.len() < before)
    }

    async fn discard_interface(&self, tenant_id: &str, id: InterfaceId) -> StoreResult<bool> {
        let mut tables = self.tables.lock();
        if !tables.interfaces.get(&id).is_some_and(|i| i.tenant_id == tenant_id) {
            return Ok(false);
        }
        if tables.deployments.iter().any(|d| d.interface_id == id) {
            return Err(StoreError::Conflict(format!("interface {id} has deployments")));
        }
        tables.interfaces.remove(&id);
        tables.versions.retain(|v| v.interface_id != id);
        Ok(true)
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn deployments_for(&self, interface_id: InterfaceId) -> StoreResult<Vec<Deployment>> {
        Ok(self
            .tables
            .lock()
            .deployments
            .iter()
            .filter(|d| d.interface_id == interface_id)
            .cloned()
            .collect())
    }

    async fn commit_publication(&self, plan: &PublicationPlan) -> StoreResult<PublicationReceipt> {
        let mut tables = self.tables.lock();
        let interface_id = plan.interface_id();
        let tenant_id = &plan.deployment.tenant_id;

        match tables.interfaces.get(&interface_id) {
            Some(i) if &i.tenant_id == tenant_id => {}
            _ => return Err(StoreError::not_found("interface", interface_id)),
        }
        if !tables.versions.iter().any(|v| v.id == plan.version_id() && v.interface_id == interface_id) {
            return Err(StoreError::not_found("version", plan.version_id()));
        }

        let active: BTreeSet<DeploymentId> = tables
            .deployments
            .iter()
            .filter(|d| d.interface_id == interface_id && d.is_active())
            .map(|d| d.id)
            .collect();
        if active != plan.observed_active {
            return Err(StoreError::Conflict(format!(
                "active deployments of interface {interface_id} changed since they were read"
            )));
        }

        let mut deployment = plan.deployment.clone();
        deployment.status = DeploymentStatus::Active;
        let deployment_id = deployment.id;
        tables.deployments.push(deployment);

        let mut demoted = Vec::new();
        for row in &mut tables.deployments {
            if row.interface_id == interface_id && row.id != deployment_id && row.is_active() {
                row.status = DeploymentStatus::Inactive;
                demoted.push(row.id);
            }
        }

        let interface = tables
            .interfaces
            .get_mut(&interface_id)
            .ok_or_else(|| StoreError::not_found("interface", interface_id))?;
        interface.status = InterfaceStatus::Published;
        interface.active_version_id = Some(plan.version_id());
        interface.updated_at = Utc::now();

        Ok(PublicationReceipt {
            deployment_id,
            demoted,
            interface: interface.clone(),
        })
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn session(&self, key: &SessionKey) -> StoreResult<Option<JourneySession>> {
        Ok(self.tables.lock().sessions.get(key).cloned())
    }

    async fn save_session(&self, session: JourneySession) -> StoreResult<()> {
        self.tables.lock().sessions.insert(session.key(), session);
        Ok(())
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn add_todo(&self, todo: Todo) -> StoreResult<()> {
        self.tables.lock().todos.push(todo);
        Ok(())
    }

    async fn todos(&self, tenant_id: &str) -> StoreResult<Vec<Todo>> {
        Ok(self
            .tables
            .lock()
            .todos
            .iter()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn complete_todos(&self, tenant_id: &str, subject_id: &str) -> StoreResult<usize> {
        let mut tables = self.tables.lock();
        let mut completed = 0;
        for todo in tables.todos.iter_mut().filter(|t| {
            t.tenant_id == tenant_id && t.status == TodoStatus::Open && t.subject_id.as_deref() == Some(subject_id)
        }) {
            todo.status = TodoStatus::Done;
            completed += 1;
        }
        Ok(completed)
    }
}

/// Credential provider backed by a fixed table
#[derive(Debug, Default)]
pub struct StaticCredentials {
    secrets: HashMap<(String, String), Credentials>,
}

impl StaticCredentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, tenant_id: &str, source_id: &str, secret: impl Into<String>) -> Self {
        self.secrets
            .insert((tenant_id.to_string(), source_id.to_string()), Credentials::new(secret));
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self, tenant_id: &str, source_id: &str, _platform: PlatformType) -> StoreResult<Credentials> {
        self.secrets
            .get(&(tenant_id.to_string(), source_id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("credentials", source_id))
    }
}

/// Platform source serving canned payloads per source id
#[derive(Debug, Default)]
pub struct StaticEventSource {
    payloads: Mutex<HashMap<String, Vec<Value>>>,
}

impl StaticEventSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_payloads(self, source_id: &str, payloads: Vec<Value>) -> Self {
        self.set_payloads(source_id, payloads);
        self
    }

    /// Replace what a source returns on the next fetch
    pub fn set_payloads(&self, source_id: &str, payloads: Vec<Value>) {
        self.payloads.lock().insert(source_id.to_string(), payloads);
    }
}

#[async_trait]
impl PlatformEventSource for StaticEventSource {
    async fn fetch(&self, request: &FetchRequest, _credentials: &Credentials) -> StoreResult<Vec<Value>> {
        let payloads = self.payloads.lock();
        let batch = payloads
            .get(&request.source_id)
            .ok_or_else(|| StoreError::Backend(format!("source {} is not connected", request.source_id)))?;
        Ok(batch.iter().take(request.limit).cloned().collect())
    }
}
