//! Run identity, records and the run registry

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::error::WorkflowError;
use crate::state_machine::validate_transition;
use crate::step::{StepError, Suspension};

/// Unique run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run_{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("run_").unwrap_or(s);
        Ulid::from_string(raw).map(Self)
    }
}

/// Run lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Suspended,
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant and conversation a run belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunScope {
    pub tenant_id: String,
    pub thread_id: String,
}

impl RunScope {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            thread_id: thread_id.into(),
        }
    }
}

/// Immutable per-run context visible to every step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    pub run_id: RunId,
    pub workflow_id: String,
    pub tenant_id: String,
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
}

impl RunContext {
    #[must_use]
    pub fn new(workflow_id: impl Into<String>, scope: RunScope) -> Self {
        Self {
            run_id: RunId::new(),
            workflow_id: workflow_id.into(),
            tenant_id: scope.tenant_id,
            thread_id: scope.thread_id,
            created_at: Utc::now(),
        }
    }
}

/// Step that failed a run and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    pub step_id: String,
    pub error: StepError,
}

/// Persisted state of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub context: RunContext,
    pub status: RunStatus,
    /// Index of the step to execute next (or the one that suspended)
    pub cursor: usize,
    /// Input for the step at `cursor`
    pub pending_input: Option<Value>,
    pub completed_steps: Vec<String>,
    pub suspended_step: Option<String>,
    pub suspension: Option<Suspension>,
    pub failure: Option<RunFailure>,
    pub output: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    #[must_use]
    pub fn pending(context: RunContext, input: Value) -> Self {
        Self {
            updated_at: context.created_at,
            context,
            status: RunStatus::Pending,
            cursor: 0,
            pending_input: Some(input),
            completed_steps: Vec::new(),
            suspended_step: None,
            suspension: None,
            failure: None,
            output: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.context.run_id
    }
}

/// Outcome of driving a run until it stops
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome<O> {
    #[serde(rename_all = "camelCase")]
    Success { run_id: RunId, output: O },
    #[serde(rename_all = "camelCase")]
    Suspended {
        run_id: RunId,
        step_id: String,
        suspension: Suspension,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        run_id: RunId,
        step_id: String,
        error: StepError,
    },
}

impl<O> RunOutcome<O> {
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            Self::Success { run_id, .. } | Self::Suspended { run_id, .. } | Self::Failed { run_id, .. } => {
                *run_id
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        match self {
            Self::Success { .. } => RunStatus::Success,
            Self::Suspended { .. } => RunStatus::Suspended,
            Self::Failed { .. } => RunStatus::Failed,
        }
    }

    #[must_use]
    pub fn output(&self) -> Option<&O> {
        match self {
            Self::Success { output, .. } => Some(output),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_output(self) -> Option<O> {
        match self {
            Self::Success { output, .. } => Some(output),
            _ => None,
        }
    }

    #[must_use]
    pub fn suspension(&self) -> Option<&Suspension> {
        match self {
            Self::Suspended { suspension, .. } => Some(suspension),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&StepError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Concurrent store of run records
///
/// Status changes go through [`RunRegistry::transition`], which checks the
/// current status and the state machine under the entry lock, so two
/// concurrent resumes of one run cannot both win.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: DashMap<RunId, RunRecord>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: RunRecord) {
        self.runs.insert(record.run_id(), record);
    }

    #[must_use]
    pub fn get(&self, run_id: RunId) -> Option<RunRecord> {
        self.runs.get(&run_id).map(|r| r.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Records belonging to one thread, oldest first
    #[must_use]
    pub fn list_for_thread(&self, thread_id: &str) -> Vec<RunRecord> {
        let mut records: Vec<RunRecord> = self
            .runs
            .iter()
            .filter(|r| r.context.thread_id == thread_id)
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(RunRecord::run_id);
        records
    }

    /// Compare-and-set status change; returns the updated record
    pub fn transition(&self, run_id: RunId, from: RunStatus, to: RunStatus) -> Result<RunRecord, WorkflowError> {
        self.transition_with(run_id, from, to, |_| {})
    }

    /// Compare-and-set status change that also mutates the record
    pub fn transition_with<F>(
        &self,
        run_id: RunId,
        from: RunStatus,
        to: RunStatus,
        apply: F,
    ) -> Result<RunRecord, WorkflowError>
    where
        F: FnOnce(&mut RunRecord),
    {
        let mut entry = self.runs.get_mut(&run_id).ok_or(WorkflowError::RunNotFound(run_id))?;

        if entry.status != from {
            return Err(match entry.status {
                RunStatus::Cancelled => WorkflowError::RunCancelled(run_id),
                actual => WorkflowError::UnexpectedStatus {
                    run_id,
                    expected: from,
                    actual,
                },
            });
        }
        validate_transition(from, to)?;

        entry.status = to;
        apply(&mut entry);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Mutate a record without changing its status
    pub fn update<F>(&self, run_id: RunId, apply: F) -> Result<(), WorkflowError>
    where
        F: FnOnce(&mut RunRecord),
    {
        let mut entry = self.runs.get_mut(&run_id).ok_or(WorkflowError::RunNotFound(run_id))?;
        apply(&mut entry);
        entry.updated_at = Utc::now();
        Ok(())
    }
}
