//! Workflow assembly and execution

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use crate::error::WorkflowError;
use crate::run::{RunContext, RunFailure, RunId, RunOutcome, RunRecord, RunRegistry, RunScope, RunStatus};
use crate::step::{Step, StepContext, StepError, StepOutcome};

/// Type-erased step operating on JSON values
#[async_trait]
trait ErasedStep: Send + Sync {
    fn id(&self) -> &'static str;

    fn check_resume(&self, data: &Value) -> Result<(), serde_json::Error>;

    async fn run(
        &self,
        input: Value,
        run: &RunContext,
        resume: Option<Value>,
    ) -> Result<StepOutcome<Value>, StepError>;
}

struct TypedStep<S>(S);

#[async_trait]
impl<S: Step> ErasedStep for TypedStep<S> {
    fn id(&self) -> &'static str {
        self.0.id()
    }

    fn check_resume(&self, data: &Value) -> Result<(), serde_json::Error> {
        serde_json::from_value::<S::Resume>(data.clone()).map(|_| ())
    }

    async fn run(
        &self,
        input: Value,
        run: &RunContext,
        resume: Option<Value>,
    ) -> Result<StepOutcome<Value>, StepError> {
        let id = self.0.id();
        let input: S::Input = serde_json::from_value(input)
            .map_err(|e| StepError::schema(format!("input of step '{id}' is malformed: {e}")))?;
        let resume = resume
            .map(serde_json::from_value::<S::Resume>)
            .transpose()
            .map_err(|e| StepError::schema(format!("resume data of step '{id}' is malformed: {e}")))?;

        let ctx = StepContext::new(run, resume);
        match self.0.execute(input, &ctx).await? {
            StepOutcome::Complete(output) => serde_json::to_value(output)
                .map(StepOutcome::Complete)
                .map_err(|e| StepError::internal(format!("output of step '{id}' did not serialize: {e}"))),
            StepOutcome::Suspend(suspension) => Ok(StepOutcome::Suspend(suspension)),
        }
    }
}

/// Builds a workflow whose steps are wired output-to-input at compile time
pub struct WorkflowBuilder<I, O> {
    id: String,
    steps: Vec<Arc<dyn ErasedStep>>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I> WorkflowBuilder<I, I>
where
    I: Serialize + DeserializeOwned + Send + 'static,
{
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            _types: PhantomData,
        }
    }
}

impl<I, O> WorkflowBuilder<I, O>
where
    I: Serialize + DeserializeOwned + Send + 'static,
    O: Serialize + DeserializeOwned + Send + 'static,
{
    /// Append a step consuming the current output type
    #[must_use]
    pub fn then<S>(mut self, step: S) -> WorkflowBuilder<I, S::Output>
    where
        S: Step<Input = O>,
    {
        self.steps.push(Arc::new(TypedStep(step)));
        WorkflowBuilder {
            id: self.id,
            steps: self.steps,
            _types: PhantomData,
        }
    }

    #[must_use]
    pub fn build(self) -> Workflow<I, O> {
        self.build_with_registry(Arc::new(RunRegistry::new()))
    }

    /// Build against a registry shared with other workflows
    #[must_use]
    pub fn build_with_registry(self, runs: Arc<RunRegistry>) -> Workflow<I, O> {
        Workflow {
            id: self.id,
            steps: self.steps,
            runs,
            _types: PhantomData,
        }
    }
}

/// Reference to a created run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: RunId,
    pub workflow_id: String,
}

/// Sequential workflow taking `I` and producing `O`
pub struct Workflow<I, O> {
    id: String,
    steps: Vec<Arc<dyn ErasedStep>>,
    runs: Arc<RunRegistry>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> std::fmt::Debug for Workflow<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("steps", &self.steps.iter().map(|s| s.id()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<I, O> Workflow<I, O>
where
    I: Serialize + DeserializeOwned + Send + 'static,
    O: Serialize + DeserializeOwned + Send + 'static,
{
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn step_ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.id()).collect()
    }

    #[inline]
    #[must_use]
    pub fn runs(&self) -> &Arc<RunRegistry> {
        &self.runs
    }

    /// Register a pending run for `input`
    pub fn create_run(&self, scope: RunScope, input: I) -> Result<RunHandle, WorkflowError> {
        let input = serde_json::to_value(input)?;
        let context = RunContext::new(self.id.clone(), scope);
        let run_id = context.run_id;
        self.runs.insert(RunRecord::pending(context, input));

        tracing::debug!(workflow = %self.id, %run_id, "run created");
        Ok(RunHandle {
            run_id,
            workflow_id: self.id.clone(),
        })
    }

    /// Drive a pending run until it completes, fails or suspends
    pub async fn start(&self, run_id: RunId) -> Result<RunOutcome<O>, WorkflowError> {
        self.owned_record(run_id)?;
        let record = self.runs.transition(run_id, RunStatus::Pending, RunStatus::Running)?;
        self.drive(record, None).await
    }

    /// Create and start a run in one call
    pub async fn execute(&self, scope: RunScope, input: I) -> Result<RunOutcome<O>, WorkflowError> {
        let handle = self.create_run(scope, input)?;
        self.start(handle.run_id).await
    }

    /// Re-enter the suspended step with `data`
    ///
    /// `data` must decode as the suspended step's resume type; otherwise the
    /// run is left suspended and [`WorkflowError::InvalidResumeData`] is
    /// returned.
    pub async fn resume(&self, run_id: RunId, data: Value) -> Result<RunOutcome<O>, WorkflowError> {
        let record = self.owned_record(run_id)?;
        match record.status {
            RunStatus::Suspended => {}
            RunStatus::Cancelled => return Err(WorkflowError::RunCancelled(run_id)),
            actual => {
                return Err(WorkflowError::UnexpectedStatus {
                    run_id,
                    expected: RunStatus::Suspended,
                    actual,
                })
            }
        }

        let step = self.step_at(run_id, record.cursor)?;
        step.check_resume(&data).map_err(|e| WorkflowError::InvalidResumeData {
            run_id,
            step_id: step.id().to_string(),
            message: e.to_string(),
        })?;

        let record = self
            .runs
            .transition_with(run_id, RunStatus::Suspended, RunStatus::Running, |r| {
                r.suspension = None;
                r.suspended_step = None;
            })?;
        tracing::info!(workflow = %self.id, %run_id, step = step.id(), "run resumed");
        self.drive(record, Some(data)).await
    }

    /// Cancel a suspended run
    pub fn cancel(&self, run_id: RunId) -> Result<RunStatus, WorkflowError> {
        self.owned_record(run_id)?;
        let record = self.runs.transition(run_id, RunStatus::Suspended, RunStatus::Cancelled)?;
        tracing::info!(workflow = %self.id, %run_id, "run cancelled");
        Ok(record.status)
    }

    /// Current status of a run
    pub fn status(&self, run_id: RunId) -> Result<RunStatus, WorkflowError> {
        Ok(self.owned_record(run_id)?.status)
    }

    /// Full persisted record of a run
    pub fn snapshot(&self, run_id: RunId) -> Result<RunRecord, WorkflowError> {
        self.owned_record(run_id)
    }

    fn owned_record(&self, run_id: RunId) -> Result<RunRecord, WorkflowError> {
        self.runs
            .get(run_id)
            .filter(|r| r.context.workflow_id == self.id)
            .ok_or(WorkflowError::RunNotFound(run_id))
    }

    fn step_at(&self, run_id: RunId, cursor: usize) -> Result<&Arc<dyn ErasedStep>, WorkflowError> {
        self.steps
            .get(cursor)
            .ok_or(WorkflowError::MissingStep { run_id, cursor })
    }

    async fn drive(&self, record: RunRecord, resume: Option<Value>) -> Result<RunOutcome<O>, WorkflowError> {
        let run_id = record.run_id();
        let span = tracing::info_span!("workflow_run", workflow = %self.id, %run_id);
        self.drive_inner(record, resume).instrument(span).await
    }

    async fn drive_inner(
        &self,
        record: RunRecord,
        mut resume: Option<Value>,
    ) -> Result<RunOutcome<O>, WorkflowError> {
        let run_id = record.run_id();
        let context = record.context.clone();
        let mut cursor = record.cursor;
        let mut value = record.pending_input.unwrap_or(Value::Null);

        while cursor < self.steps.len() {
            let step = self.step_at(run_id, cursor)?;
            let step_id = step.id();
            tracing::debug!(step = step_id, cursor, "executing step");

            match step.run(value.clone(), &context, resume.take()).await {
                Ok(StepOutcome::Complete(output)) => {
                    cursor += 1;
                    value = output;
                    self.runs.update(run_id, |r| {
                        r.cursor = cursor;
                        r.pending_input = Some(value.clone());
                        r.completed_steps.push(step_id.to_string());
                    })?;
                }
                Ok(StepOutcome::Suspend(suspension)) => {
                    tracing::info!(step = step_id, reason = %suspension.reason, "run suspended");
                    let stored = suspension.clone();
                    self.runs
                        .transition_with(run_id, RunStatus::Running, RunStatus::Suspended, |r| {
                            r.cursor = cursor;
                            r.pending_input = Some(value);
                            r.suspended_step = Some(step_id.to_string());
                            r.suspension = Some(stored);
                        })?;
                    return Ok(RunOutcome::Suspended {
                        run_id,
                        step_id: step_id.to_string(),
                        suspension,
                    });
                }
                Err(error) => return self.fail(run_id, step_id, error),
            }
        }

        let last_step = self.steps.last().map_or("input", |s| s.id());
        let output: O = match serde_json::from_value(value.clone()) {
            Ok(output) => output,
            Err(e) => {
                let error = StepError::schema(format!("workflow output is malformed: {e}"));
                return self.fail(run_id, last_step, error);
            }
        };

        self.runs
            .transition_with(run_id, RunStatus::Running, RunStatus::Success, |r| {
                r.pending_input = None;
                r.output = Some(value);
            })?;
        tracing::info!("run succeeded");
        Ok(RunOutcome::Success { run_id, output })
    }

    fn fail(&self, run_id: RunId, step_id: &str, error: StepError) -> Result<RunOutcome<O>, WorkflowError> {
        tracing::error!(step = step_id, code = error.kind_code(), error = %error.message, "run failed");
        let failure = RunFailure {
            step_id: step_id.to_string(),
            error: error.clone(),
        };
        self.runs
            .transition_with(run_id, RunStatus::Running, RunStatus::Failed, |r| {
                r.failure = Some(failure);
            })?;
        Ok(RunOutcome::Failed {
            run_id,
            step_id: step_id.to_string(),
            error,
        })
    }
}
