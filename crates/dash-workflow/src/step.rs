//! Step contract
//!
//! A step receives the previous step's output and either completes with its
//! own output or suspends with a payload describing what it needs. A
//! suspended step is re-entered with the same input plus the caller's
//! resume data decoded as [`Step::Resume`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::run::RunContext;

/// One unit of a workflow
#[async_trait]
pub trait Step: Send + Sync + 'static {
    type Input: Serialize + DeserializeOwned + Send + 'static;
    type Output: Serialize + DeserializeOwned + Send + 'static;
    /// Data accepted when resuming after this step suspended
    type Resume: DeserializeOwned + Send + Sync + 'static;

    /// Stable identifier, unique within a workflow
    fn id(&self) -> &'static str;

    async fn execute(
        &self,
        input: Self::Input,
        ctx: &StepContext<'_, Self::Resume>,
    ) -> Result<StepOutcome<Self::Output>, StepError>;
}

/// Resume type for steps that never suspend
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NoResume;

/// What a step sees besides its input
#[derive(Debug)]
pub struct StepContext<'a, R> {
    run: &'a RunContext,
    resume: Option<R>,
}

impl<'a, R> StepContext<'a, R> {
    #[inline]
    #[must_use]
    pub fn new(run: &'a RunContext, resume: Option<R>) -> Self {
        Self { run, resume }
    }

    #[inline]
    #[must_use]
    pub fn run(&self) -> &RunContext {
        self.run
    }

    /// Resume data, present only when re-entered after a suspension
    #[inline]
    #[must_use]
    pub fn resume_data(&self) -> Option<&R> {
        self.resume.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.resume.is_some()
    }
}

/// Result of a step that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<O> {
    Complete(O),
    Suspend(Suspension),
}

impl<O> StepOutcome<O> {
    #[inline]
    #[must_use]
    pub fn suspend(reason: impl Into<String>, payload: Value) -> Self {
        Self::Suspend(Suspension::new(reason, payload))
    }
}

/// Why a run paused and what the caller must supply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspension {
    pub reason: String,
    pub payload: Value,
}

impl Suspension {
    #[inline]
    #[must_use]
    pub fn new(reason: impl Into<String>, payload: Value) -> Self {
        Self {
            reason: reason.into(),
            payload,
        }
    }
}

/// Failure classification carried on a [`StepError`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepErrorKind {
    NotFound,
    /// Gate that must hold before the step can run, with a machine-readable code
    Precondition { code: String },
    /// Spec validation below threshold
    ValidationGate { errors: Vec<String>, score: f64 },
    /// Data did not have the expected shape
    Schema,
    /// Concurrent modification detected
    Conflict,
    Internal,
}

/// Typed step failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    #[serde(flatten)]
    pub kind: StepErrorKind,
    pub message: String,
}

impl StepError {
    #[must_use]
    pub fn new(kind: StepErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn precondition(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::Precondition { code: code.into() }, message)
    }

    #[must_use]
    pub fn validation_gate(errors: Vec<String>, score: f64, message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::ValidationGate { errors, score }, message)
    }

    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::Schema, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::Conflict, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::Internal, message)
    }

    /// Machine-readable code, e.g. `SCHEMA_NOT_READY` or `VALIDATION_GATE`
    #[must_use]
    pub fn kind_code(&self) -> &str {
        match &self.kind {
            StepErrorKind::NotFound => "NOT_FOUND",
            StepErrorKind::Precondition { code } => code,
            StepErrorKind::ValidationGate { .. } => "VALIDATION_GATE",
            StepErrorKind::Schema => "SCHEMA",
            StepErrorKind::Conflict => "CONFLICT",
            StepErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind_code(), self.message)
    }
}

impl std::error::Error for StepError {}
