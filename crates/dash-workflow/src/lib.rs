//! Dash Workflow - typed sequential step runner
//!
//! A workflow is an ordered chain of [`Step`]s where each step's output
//! type is exactly the next step's input type. The chain is assembled with
//! [`WorkflowBuilder::then`], so a mis-wired pipeline fails to compile.
//!
//! Runs follow a small state machine (see [`state_machine`]):
//! - `pending -> running -> {success | failed | suspended}`
//! - `suspended -> running` on [`Workflow::resume`]
//! - `suspended -> cancelled` on [`Workflow::cancel`]
//!
//! # Example
//!
//! ```rust,ignore
//! use dash_workflow::{RunScope, WorkflowBuilder};
//!
//! let workflow = WorkflowBuilder::<Order, Order>::new("checkout")
//!     .then(PriceOrder)
//!     .then(AwaitApproval)
//!     .then(Finalize)
//!     .build();
//!
//! let outcome = workflow.execute(RunScope::new("tenant", "thread"), order).await?;
//! if let RunOutcome::Suspended { run_id, .. } = outcome {
//!     workflow.resume(run_id, serde_json::json!({"approved": true})).await?;
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod engine;
pub mod error;
pub mod run;
pub mod state_machine;
pub mod step;

pub use engine::{RunHandle, Workflow, WorkflowBuilder};
pub use error::WorkflowError;
pub use run::{RunContext, RunFailure, RunId, RunOutcome, RunRecord, RunRegistry, RunScope, RunStatus};
pub use step::{NoResume, Step, StepContext, StepError, StepErrorKind, StepOutcome, Suspension};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
