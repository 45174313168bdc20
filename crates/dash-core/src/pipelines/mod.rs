//! Concrete workflows over the store seams
//!
//! [`Pipelines`] is built once from a [`Stores`] bundle and a
//! [`PipelineConfig`]; every workflow shares one run registry so runs can be
//! inspected in one place.

pub mod backfill;
pub mod deployment;
pub mod generation;

use std::sync::Arc;

use dash_workflow::{RunContext, RunRegistry, Workflow};

use crate::audit::MemoryAuditLog;
use crate::config::PipelineConfig;
use crate::edit::InterfaceEditor;
use crate::error::{CoreError, StoreResult};
use crate::journey::{JourneySession, SessionKey};
use crate::store::{
    AuditSink, CredentialProvider, DeploymentStore, EventStore, MemoryStore, PlatformEventSource, SessionStore,
    SpecStore, TodoStore,
};

pub use backfill::{BackfillInput, BackfillOutput};
pub use deployment::{DeployInput, DeployOutput};
pub use generation::{GenerationInput, GenerationOutput, MappingResolution};

/// Workflow id of the backfill pipeline
pub const BACKFILL_WORKFLOW: &str = "backfill";
/// Workflow id of the generation pipeline
pub const GENERATION_WORKFLOW: &str = "generation";
/// Workflow id of the deployment pipeline
pub const DEPLOYMENT_WORKFLOW: &str = "deployment";

/// Collaborators the pipelines run against
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventStore>,
    pub specs: Arc<dyn SpecStore>,
    pub deployments: Arc<dyn DeploymentStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub todos: Arc<dyn TodoStore>,
    pub audit: Arc<dyn AuditSink>,
    pub platform: Arc<dyn PlatformEventSource>,
    pub credentials: Arc<dyn CredentialProvider>,
}

impl Stores {
    /// Every persistence seam served by one `MemoryStore`
    #[must_use]
    pub fn in_memory(
        store: Arc<MemoryStore>,
        audit: Arc<MemoryAuditLog>,
        platform: Arc<dyn PlatformEventSource>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            events: store.clone(),
            specs: store.clone(),
            deployments: store.clone(),
            sessions: store.clone(),
            todos: store,
            audit,
            platform,
            credentials,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_deployments(mut self, deployments: Arc<dyn DeploymentStore>) -> Self {
        self.deployments = deployments;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_todos(mut self, todos: Arc<dyn TodoStore>) -> Self {
        self.todos = todos;
        self
    }
}

/// The three pipelines and the interface editor
pub struct Pipelines {
    pub backfill: Workflow<BackfillInput, BackfillOutput>,
    pub generation: Workflow<GenerationInput, GenerationOutput>,
    pub deployment: Workflow<DeployInput, DeployOutput>,
    pub editor: InterfaceEditor,
    runs: Arc<RunRegistry>,
    config: PipelineConfig,
}

impl Pipelines {
    /// Assemble every pipeline
    ///
    /// # Errors
    /// Returns `CoreError::Config` if `config` fails validation
    pub fn new(stores: &Stores, config: PipelineConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let runs = Arc::new(RunRegistry::new());
        let shared = Arc::new(config.clone());

        tracing::info!(
            grid_columns = config.grid_columns,
            gate_threshold = config.validation_gate_threshold,
            "pipelines assembled"
        );

        Ok(Self {
            backfill: backfill::build(stores, shared.clone(), runs.clone()),
            generation: generation::build(stores, shared.clone(), runs.clone()),
            deployment: deployment::build(stores, shared, runs.clone()),
            editor: InterfaceEditor::new(stores.specs.clone(), config.validation_gate_threshold),
            runs,
            config,
        })
    }

    #[inline]
    #[must_use]
    pub fn runs(&self) -> &Arc<RunRegistry> {
        &self.runs
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

fn session_key(run: &RunContext) -> SessionKey {
    SessionKey::new(run.tenant_id.clone(), run.thread_id.clone())
}

/// Load the run's session, creating it when absent
async fn load_or_create_session(sessions: &dyn SessionStore, run: &RunContext) -> StoreResult<JourneySession> {
    let key = session_key(run);
    Ok(sessions
        .session(&key)
        .await?
        .unwrap_or_else(|| JourneySession::new(&key)))
}
