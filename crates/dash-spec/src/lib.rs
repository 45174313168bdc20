//! Dashboard spec documents
//!
//! The renderer-facing document type and the pure operations over it.
//!
//! # Core Concepts
//!
//! - [`DashboardSpec`]: grid layout plus an ordered list of [`Component`]s
//! - [`DesignTokens`]: open style-variable tree addressed by dot paths
//! - [`validate`] / [`validate_value`]: structural checks with a score
//! - [`apply_patch`]: ordered [`PatchOperation`]s producing a new spec
//! - [`GridLayout`]: flow placement used when generating specs
//!
//! # Example
//!
//! ```rust,ignore
//! use dash_spec::{apply_patch, validate, PatchOperation};
//!
//! let outcome = apply_patch(&spec, &tokens, &[PatchOperation::RemoveComponent {
//!     component_id: "kpi-1".to_string(),
//! }]);
//! let result = validate(&outcome.spec);
//! assert!(result.passes_gate(0.8));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod layout;
mod model;
mod patch;
mod validate;

pub use layout::GridLayout;
pub use model::{
    Component, DashboardSpec, DesignTokens, GridPosition, Props, SpecError, SpecLayout,
    SPEC_FORMAT_VERSION,
};
pub use patch::{apply_patch, PatchError, PatchOperation, PatchOutcome};
pub use validate::{
    validate, validate_value, GateFailure, SpecValidator, ValidationResult,
    DEFAULT_GATE_THRESHOLD, SCORE_PENALTY_PER_ERROR,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
