//! Deployment: revalidate, confirm, publish
//!
//! `createDeploymentRecord`, `markPreviousDeploymentsInactive` and
//! `updateInterfaceStatus` stage a [`PublicationPlan`] and commit it in one
//! store call. A run that dies between the three steps leaves nothing
//! half-written, and a concurrent deployment of the same interface makes
//! the commit fail with a conflict instead of leaving two active rows.

use std::sync::Arc;

use async_trait::async_trait;
use dash_spec::{SpecValidator, ValidationResult};
use dash_workflow::{NoResume, RunId, RunRegistry, Step, StepContext, StepError, StepOutcome, Workflow, WorkflowBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{load_or_create_session, Stores, DEPLOYMENT_WORKFLOW};
use crate::audit::AuditRecord;
use crate::config::PipelineConfig;
use crate::journey::JourneyMode;
use crate::store::{AuditSink, DeploymentStore, PublicationPlan, PublicationReceipt, SessionStore, SpecStore, TodoStore};
use crate::types::{Deployment, DeploymentId, InterfaceId, VersionId};

/// Precondition code when deploy is requested without confirmation
pub const CONFIRMATION_REQUIRED: &str = "CONFIRMATION_REQUIRED";

/// Audit action recorded for a successful deployment
pub const DEPLOYMENT_AUDIT_ACTION: &str = "deployment.activated";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployInput {
    pub interface_id: InterfaceId,
    pub preview_version_id: VersionId,
    #[serde(default)]
    pub confirmed: bool,
}

impl DeployInput {
    #[must_use]
    pub fn new(interface_id: InterfaceId, preview_version_id: VersionId, confirmed: bool) -> Self {
        Self {
            interface_id,
            preview_version_id,
            confirmed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revalidated {
    pub input: DeployInput,
    pub validation: ValidationResult,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmed {
    pub interface_id: InterfaceId,
    pub version_id: VersionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedPublication {
    pub plan: PublicationPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Published {
    pub receipt: PublicationReceipt,
    pub version_id: VersionId,
    #[serde(default)]
    pub portal_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    pub run_id: RunId,
    pub deployment_id: DeploymentId,
    pub interface_id: InterfaceId,
    pub preview_version_id: VersionId,
    pub portal_url: String,
    pub demoted: Vec<DeploymentId>,
}

pub struct RevalidateSpec {
    specs: Arc<dyn SpecStore>,
    validator: SpecValidator,
}

#[async_trait]
impl Step for RevalidateSpec {
    type Input = DeployInput;
    type Output = Revalidated;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "revalidateSpec"
    }

    async fn execute(
        &self,
        input: DeployInput,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<Revalidated>, StepError> {
        if self.specs.interface(&ctx.run().tenant_id, input.interface_id).await?.is_none() {
            return Err(StepError::not_found(format!("interface not found: {}", input.interface_id)));
        }
        let version = self
            .specs
            .version(input.preview_version_id)
            .await?
            .filter(|v| v.interface_id == input.interface_id)
            .ok_or_else(|| {
                StepError::not_found(format!(
                    "preview version {} not found for interface {}",
                    input.preview_version_id, input.interface_id
                ))
            })?;

        match self.validator.check(&version.spec_json) {
            Ok(validation) => Ok(StepOutcome::Complete(Revalidated { input, validation })),
            Err(gate) => {
                let message = gate.to_string();
                Err(StepError::validation_gate(gate.errors, gate.score, message))
            }
        }
    }
}

pub struct CheckConfirmation;

#[async_trait]
impl Step for CheckConfirmation {
    type Input = Revalidated;
    type Output = Confirmed;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "checkConfirmation"
    }

    async fn execute(
        &self,
        revalidated: Revalidated,
        _ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<Confirmed>, StepError> {
        if !revalidated.input.confirmed {
            return Err(StepError::precondition(
                CONFIRMATION_REQUIRED,
                "deployment must be explicitly confirmed",
            ));
        }
        Ok(StepOutcome::Complete(Confirmed {
            interface_id: revalidated.input.interface_id,
            version_id: revalidated.input.preview_version_id,
        }))
    }
}

pub struct CreateDeploymentRecord;

#[async_trait]
impl Step for CreateDeploymentRecord {
    type Input = Confirmed;
    type Output = StagedPublication;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "createDeploymentRecord"
    }

    async fn execute(
        &self,
        confirmed: Confirmed,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<StagedPublication>, StepError> {
        let deployment = Deployment::active(ctx.run().tenant_id.clone(), confirmed.interface_id, confirmed.version_id);
        tracing::debug!(deployment = %deployment.id, "deployment record staged");
        Ok(StepOutcome::Complete(StagedPublication {
            plan: PublicationPlan::new(deployment),
        }))
    }
}

pub struct MarkPreviousDeploymentsInactive {
    deployments: Arc<dyn DeploymentStore>,
}

#[async_trait]
impl Step for MarkPreviousDeploymentsInactive {
    type Input = StagedPublication;
    type Output = StagedPublication;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "markPreviousDeploymentsInactive"
    }

    async fn execute(
        &self,
        mut staged: StagedPublication,
        _ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<StagedPublication>, StepError> {
        staged.plan.observed_active = self
            .deployments
            .deployments_for(staged.plan.interface_id())
            .await?
            .into_iter()
            .filter(Deployment::is_active)
            .map(|d| d.id)
            .collect();
        tracing::debug!(to_demote = staged.plan.observed_active.len(), "previous deployments staged for demotion");
        Ok(StepOutcome::Complete(staged))
    }
}

pub struct UpdateInterfaceStatus {
    deployments: Arc<dyn DeploymentStore>,
    sessions: Arc<dyn SessionStore>,
}

#[async_trait]
impl Step for UpdateInterfaceStatus {
    type Input = StagedPublication;
    type Output = Published;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "updateInterfaceStatus"
    }

    async fn execute(
        &self,
        staged: StagedPublication,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<Published>, StepError> {
        let receipt = self.deployments.commit_publication(&staged.plan).await?;
        tracing::info!(
            interface = %receipt.interface.id,
            deployment = %receipt.deployment_id,
            demoted = receipt.demoted.len(),
            "interface published"
        );

        match load_or_create_session(self.sessions.as_ref(), ctx.run()).await {
            Ok(mut session) => {
                session.set_mode(JourneyMode::Deploy);
                if let Err(e) = self.sessions.save_session(session).await {
                    tracing::warn!(error = %e, "failed to move session to deploy");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to load session after publication"),
        }

        Ok(StepOutcome::Complete(Published {
            version_id: staged.plan.version_id(),
            receipt,
            portal_url: None,
        }))
    }
}

pub struct GeneratePortalUrl {
    config: Arc<PipelineConfig>,
}

#[async_trait]
impl Step for GeneratePortalUrl {
    type Input = Published;
    type Output = Published;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "generatePortalUrl"
    }

    async fn execute(
        &self,
        mut published: Published,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<Published>, StepError> {
        published.portal_url = Some(format!(
            "{}/{}/{}",
            self.config.portal_base_url.trim_end_matches('/'),
            ctx.run().tenant_id,
            published.receipt.interface.id
        ));
        Ok(StepOutcome::Complete(published))
    }
}

pub struct LogDeploymentEvent {
    audit: Arc<dyn AuditSink>,
}

#[async_trait]
impl Step for LogDeploymentEvent {
    type Input = Published;
    type Output = Published;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "logDeploymentEvent"
    }

    async fn execute(
        &self,
        published: Published,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<Published>, StepError> {
        let record = AuditRecord::new(
            ctx.run().tenant_id.clone(),
            DEPLOYMENT_AUDIT_ACTION,
            published.receipt.deployment_id,
        )
        .with_detail(json!({
            "interfaceId": published.receipt.interface.id,
            "versionId": published.version_id,
            "demoted": published.receipt.demoted,
            "runId": ctx.run().run_id,
        }));

        if let Err(e) = self.audit.record(record).await {
            tracing::warn!(error = %e, "deployment audit entry not recorded");
        }
        Ok(StepOutcome::Complete(published))
    }
}

pub struct CompleteTodos {
    todos: Arc<dyn TodoStore>,
}

#[async_trait]
impl Step for CompleteTodos {
    type Input = Published;
    type Output = Published;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "completeTodos"
    }

    async fn execute(
        &self,
        published: Published,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<Published>, StepError> {
        let subject = published.receipt.interface.id.to_string();
        match self.todos.complete_todos(&ctx.run().tenant_id, &subject).await {
            Ok(completed) => tracing::debug!(completed, "todos completed"),
            Err(e) => tracing::warn!(error = %e, "failed to complete todos"),
        }
        Ok(StepOutcome::Complete(published))
    }
}

pub struct Finalize;

#[async_trait]
impl Step for Finalize {
    type Input = Published;
    type Output = DeployOutput;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "finalize"
    }

    async fn execute(
        &self,
        published: Published,
        ctx: &StepContext<'_, NoResume>,
    ) -> Result<StepOutcome<DeployOutput>, StepError> {
        let portal_url = published
            .portal_url
            .ok_or_else(|| StepError::internal("portal url was not generated"))?;
        Ok(StepOutcome::Complete(DeployOutput {
            run_id: ctx.run().run_id,
            deployment_id: published.receipt.deployment_id,
            interface_id: published.receipt.interface.id,
            preview_version_id: published.version_id,
            portal_url,
            demoted: published.receipt.demoted,
        }))
    }
}

pub(crate) fn build(
    stores: &Stores,
    config: Arc<PipelineConfig>,
    runs: Arc<RunRegistry>,
) -> Workflow<DeployInput, DeployOutput> {
    WorkflowBuilder::new(DEPLOYMENT_WORKFLOW)
        .then(RevalidateSpec {
            specs: stores.specs.clone(),
            validator: SpecValidator::with_threshold(config.validation_gate_threshold),
        })
        .then(CheckConfirmation)
        .then(CreateDeploymentRecord)
        .then(MarkPreviousDeploymentsInactive {
            deployments: stores.deployments.clone(),
        })
        .then(UpdateInterfaceStatus {
            deployments: stores.deployments.clone(),
            sessions: stores.sessions.clone(),
        })
        .then(GeneratePortalUrl { config })
        .then(LogDeploymentEvent {
            audit: stores.audit.clone(),
        })
        .then(CompleteTodos {
            todos: stores.todos.clone(),
        })
        .then(Finalize)
        .build_with_registry(runs)
}
