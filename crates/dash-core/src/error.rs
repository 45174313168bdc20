//! Error types for Dash Core
//!
//! - `StoreError`: failures of the persistence and platform collaborators
//! - `CoreError`: failures of direct (non-workflow) operations such as the
//!   interface editor
//!
//! Inside a pipeline, store failures become [`StepError`]s so the run
//! reports them as a failed step rather than an engine error.

use dash_spec::{GateFailure, SpecError};
use dash_workflow::{StepError, WorkflowError};

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store / collaborator error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Optimistic check failed; safe to retry
    #[error("conflict: {0}")]
    Conflict(String),

    /// Audit chain does not verify
    #[error("integrity violation at sequence {sequence}")]
    Integrity { sequence: u64 },

    /// Backend or remote platform failure
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    #[inline]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Check if the operation may succeed when retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Backend(_))
    }
}

impl From<StoreError> for StepError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::NotFound { .. } => StepError::not_found(message),
            StoreError::Conflict(_) => StepError::conflict(message),
            StoreError::Integrity { .. } | StoreError::Backend(_) => StepError::internal(message),
        }
    }
}

/// Main Dash Core error type
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("spec error: {0}")]
    Spec(#[from] SpecError),

    /// Spec did not pass the validation gate
    #[error(transparent)]
    Gate(#[from] GateFailure),

    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// Stable code for callers that branch on failure class
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(StoreError::NotFound { .. }) => "NOT_FOUND",
            Self::Store(StoreError::Conflict(_)) => "CONFLICT",
            Self::Gate(_) => "VALIDATION_GATE",
            Self::Spec(_) => "SCHEMA",
            Self::Workflow(e) if e.is_not_found() => "NOT_FOUND",
            _ => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_workflow::StepErrorKind;

    #[test]
    fn store_errors_map_to_step_taxonomy() {
        let step: StepError = StoreError::not_found("interface", "abc").into();
        assert_eq!(step.kind, StepErrorKind::NotFound);
        assert_eq!(step.message, "interface not found: abc");

        let step: StepError = StoreError::Conflict("active set changed".into()).into();
        assert_eq!(step.kind, StepErrorKind::Conflict);
    }

    #[test]
    fn gate_failure_has_validation_code() {
        let err = CoreError::from(GateFailure {
            errors: vec!["x".into()],
            score: 0.9,
            threshold: 0.8,
        });
        assert_eq!(err.code(), "VALIDATION_GATE");
    }
}
