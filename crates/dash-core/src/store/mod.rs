//! Persistence and platform collaborator seams
//!
//! Every collaborator is an object-safe async trait so pipelines hold them
//! as `Arc<dyn …>`. [`MemoryStore`] implements all persistence traits over
//! one lock; [`MemoryAuditLog`](crate::audit::MemoryAuditLog) is the
//! hash-chained audit sink.

mod memory;

pub use memory::{MemoryStore, StaticCredentials, StaticEventSource};

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::AuditRecord;
use crate::error::StoreResult;
use crate::event::Event;
use crate::journey::{JourneySession, SessionKey};
use crate::schema::SchemaSummary;
use crate::types::{Deployment, DeploymentId, Interface, InterfaceId, InterfaceVersion, PlatformType, Todo, VersionId};

/// Counts reported by an idempotent upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpsertCounts {
    pub stored: usize,
    pub skipped: usize,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert events whose `(sourceId, platformEventId)` is new
    async fn upsert_events(&self, events: Vec<Event>) -> StoreResult<UpsertCounts>;

    /// Most recent events first, at most `limit`
    async fn recent_events(&self, tenant_id: &str, source_id: &str, limit: usize) -> StoreResult<Vec<Event>>;

    async fn count_events(&self, tenant_id: &str, source_id: &str) -> StoreResult<usize>;

    async fn save_schema_summary(&self, tenant_id: &str, source_id: &str, summary: SchemaSummary) -> StoreResult<()>;

    async fn schema_summary(&self, tenant_id: &str, source_id: &str) -> StoreResult<Option<SchemaSummary>>;
}

#[async_trait]
pub trait SpecStore: Send + Sync {
    async fn create_interface(&self, interface: Interface) -> StoreResult<()>;

    /// Interface owned by `tenant_id`
    async fn interface(&self, tenant_id: &str, id: InterfaceId) -> StoreResult<Option<Interface>>;

    /// Append an immutable version; the interface must exist
    async fn append_version(&self, version: InterfaceVersion) -> StoreResult<()>;

    async fn version(&self, id: VersionId) -> StoreResult<Option<InterfaceVersion>>;

    /// Most recently appended version of an interface
    async fn latest_version(&self, interface_id: InterfaceId) -> StoreResult<Option<InterfaceVersion>>;

    async fn list_versions(&self, interface_id: InterfaceId) -> StoreResult<Vec<InterfaceVersion>>;

    /// Drop a version appended by a step that later failed; false if absent
    async fn discard_version(&self, id: VersionId) -> StoreResult<bool>;

    /// Drop an interface created by a step that later failed, with its
    /// versions; false if absent
    async fn discard_interface(&self, tenant_id: &str, id: InterfaceId) -> StoreResult<bool>;
}

/// Staged publication of one interface version
///
/// Built up by the deployment steps and applied in one
/// [`DeploymentStore::commit_publication`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationPlan {
    /// New row, inserted as active
    pub deployment: Deployment,
    /// Active rows observed for the interface when the plan was staged
    pub observed_active: BTreeSet<DeploymentId>,
}

impl PublicationPlan {
    #[must_use]
    pub fn new(deployment: Deployment) -> Self {
        Self {
            deployment,
            observed_active: BTreeSet::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn interface_id(&self) -> InterfaceId {
        self.deployment.interface_id
    }

    #[inline]
    #[must_use]
    pub fn version_id(&self) -> VersionId {
        self.deployment.preview_version_id
    }
}

/// Result of a committed publication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationReceipt {
    pub deployment_id: DeploymentId,
    pub demoted: Vec<DeploymentId>,
    pub interface: Interface,
}

#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn deployments_for(&self, interface_id: InterfaceId) -> StoreResult<Vec<Deployment>>;

    /// Atomically insert the new active row, demote the observed active rows
    /// and publish the interface pointer
    ///
    /// Fails with `StoreError::Conflict` when the interface's active set no
    /// longer equals `plan.observed_active`; nothing is written then.
    async fn commit_publication(&self, plan: &PublicationPlan) -> StoreResult<PublicationReceipt>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn session(&self, key: &SessionKey) -> StoreResult<Option<JourneySession>>;

    async fn save_session(&self, session: JourneySession) -> StoreResult<()>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append a record; returns its sequence number
    async fn record(&self, record: AuditRecord) -> StoreResult<u64>;
}

#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn add_todo(&self, todo: Todo) -> StoreResult<()>;

    async fn todos(&self, tenant_id: &str) -> StoreResult<Vec<Todo>>;

    /// Mark open todos about `subject_id` done; returns how many changed
    async fn complete_todos(&self, tenant_id: &str, subject_id: &str) -> StoreResult<usize>;
}

/// Opaque platform credential
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(***)")
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Decrypted credential for a connected source
    async fn credentials(&self, tenant_id: &str, source_id: &str, platform: PlatformType) -> StoreResult<Credentials>;
}

/// What to pull from a platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub platform: PlatformType,
    pub source_id: String,
    pub entity_id: Option<String>,
    pub limit: usize,
}

#[async_trait]
pub trait PlatformEventSource: Send + Sync {
    /// Raw payloads, newest first, at most `request.limit`
    async fn fetch(&self, request: &FetchRequest, credentials: &Credentials) -> StoreResult<Vec<Value>>;
}
