//! Engine-level errors
//!
//! These are failures of the runner itself (unknown run, wrong state, bad
//! resume payload). A step failing is not an engine error: it is reported as
//! [`RunOutcome::Failed`](crate::RunOutcome::Failed).

use crate::run::{RunId, RunStatus};

/// Workflow engine error
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// No run with this id belongs to the workflow
    #[error("run not found: {0}")]
    RunNotFound(RunId),

    /// Run is not in the state the operation needs
    #[error("run {run_id} is {actual}, expected {expected}")]
    UnexpectedStatus {
        run_id: RunId,
        expected: RunStatus,
        actual: RunStatus,
    },

    /// Run was cancelled and will not resume
    #[error("run {0} was cancelled")]
    RunCancelled(RunId),

    /// Resume payload does not match the suspended step's resume type
    #[error("invalid resume data for step '{step_id}' of run {run_id}: {message}")]
    InvalidResumeData {
        run_id: RunId,
        step_id: String,
        message: String,
    },

    /// State machine rejected a transition
    #[error("illegal run transition: {from} -> {to}")]
    IllegalTransition { from: RunStatus, to: RunStatus },

    /// Stored cursor points past the step list
    #[error("run {run_id} points at missing step {cursor}")]
    MissingStep { run_id: RunId, cursor: usize },

    /// Workflow input could not be serialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Whether the caller addressed a run that does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RunNotFound(_))
    }
}
