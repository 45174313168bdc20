//! Structural validation with a score
//!
//! Validation is pure: it never touches storage and never mutates the spec.
//! Each violated check contributes exactly one error string, and the score
//! drops by [`SCORE_PENALTY_PER_ERROR`] per error.

use crate::model::DashboardSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Score penalty per structural error
pub const SCORE_PENALTY_PER_ERROR: f64 = 0.1;

/// Minimum score a valid spec needs before it may be persisted
pub const DEFAULT_GATE_THRESHOLD: f64 = 0.8;

/// Outcome of validating a spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// `true` iff `errors` is empty
    pub valid: bool,
    /// One entry per violated check
    pub errors: Vec<String>,
    /// 1.0 minus penalties, floored at 0
    pub score: f64,
}

impl ValidationResult {
    /// Build a result from collected errors
    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let raw = 1.0 - SCORE_PENALTY_PER_ERROR * errors.len() as f64;
        // Keep decimal scores exact so threshold comparisons are stable.
        let score = (raw.max(0.0) * 1000.0).round() / 1000.0;
        Self {
            valid: errors.is_empty(),
            errors,
            score,
        }
    }

    /// Whether the hard gate lets this spec through
    #[inline]
    #[must_use]
    pub fn passes_gate(&self, threshold: f64) -> bool {
        self.valid && self.score >= threshold
    }
}

/// Validate raw JSON
///
/// Schema conformance is checked first; a document without the spec shape
/// fails fast with a single schema error.
#[must_use]
pub fn validate_value(value: &Value) -> ValidationResult {
    match serde_json::from_value::<DashboardSpec>(value.clone()) {
        Ok(spec) => validate(&spec),
        Err(e) => ValidationResult::from_errors(vec![format!("schema: {e}")]),
    }
}

/// Validate a typed spec
#[must_use]
pub fn validate(spec: &DashboardSpec) -> ValidationResult {
    let mut errors = Vec::new();

    if spec.components.is_empty() {
        errors.push("spec must contain at least one component".to_string());
    }

    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for component in &spec.components {
        if !seen.insert(component.id.as_str()) {
            duplicates.insert(component.id.as_str());
        }
    }
    if !duplicates.is_empty() {
        errors.push(format!(
            "duplicate component ids: {}",
            duplicates.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    let columns = u64::from(spec.layout.columns);
    let overflowing: Vec<String> = spec
        .components
        .iter()
        .filter(|c| c.layout.right_edge() > columns)
        .map(|c| format!("{} (col {} + w {})", c.id, c.layout.col, c.layout.w))
        .collect();
    if !overflowing.is_empty() {
        errors.push(format!(
            "component layout exceeds grid width of {} columns: {}",
            spec.layout.columns,
            overflowing.join(", ")
        ));
    }

    ValidationResult::from_errors(errors)
}

/// Gate failure with the full error list
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("spec failed validation gate (score {score:.2}, threshold {threshold:.2}): {}", .errors.join("; "))]
pub struct GateFailure {
    pub errors: Vec<String>,
    pub score: f64,
    pub threshold: f64,
}

/// Validator bound to a gate threshold
#[derive(Debug, Clone, Copy)]
pub struct SpecValidator {
    threshold: f64,
}

impl SpecValidator {
    /// Create validator with the default threshold
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_GATE_THRESHOLD)
    }

    /// Create validator with a custom threshold
    #[inline]
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Gate threshold
    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Validate and enforce the hard gate
    ///
    /// # Errors
    /// Returns `GateFailure` if the spec is invalid or scores below threshold
    pub fn check(&self, spec: &DashboardSpec) -> Result<ValidationResult, GateFailure> {
        self.gate(validate(spec))
    }

    /// Validate raw JSON and enforce the hard gate
    ///
    /// # Errors
    /// Returns `GateFailure` if the document is malformed, invalid or scores
    /// below threshold
    pub fn check_value(&self, value: &Value) -> Result<ValidationResult, GateFailure> {
        self.gate(validate_value(value))
    }

    fn gate(&self, result: ValidationResult) -> Result<ValidationResult, GateFailure> {
        if result.passes_gate(self.threshold) {
            Ok(result)
        } else {
            Err(GateFailure {
                errors: result.errors,
                score: result.score,
                threshold: self.threshold,
            })
        }
    }
}

impl Default for SpecValidator {
    fn default() -> Self {
        Self::new()
    }
}
