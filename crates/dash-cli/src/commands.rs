//! Offline spec commands

use anyhow::Context;
use dash_spec::{
    apply_patch, validate, validate_value, DashboardSpec, DesignTokens, PatchError, PatchOperation, ValidationResult,
};
use serde::Serialize;
use serde_json::Value;

/// Validate a raw spec document
///
/// Shape errors are reported in the result rather than returned.
#[must_use]
pub fn validate_spec(raw: &Value) -> ValidationResult {
    validate_value(raw)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchReport {
    pub spec: DashboardSpec,
    pub tokens: DesignTokens,
    pub errors: Vec<PatchError>,
    pub validation: ValidationResult,
}

/// Apply a JSON list of patch operations to a spec
///
/// `tokens` defaults to an empty tree.
///
/// # Errors
/// Fails if the spec or the operation list does not parse
pub fn patch_spec(spec: Value, operations: Value, tokens: Option<Value>) -> anyhow::Result<PatchReport> {
    let spec = DashboardSpec::from_value(spec).context("spec does not have the dashboard shape")?;
    let operations: Vec<PatchOperation> =
        serde_json::from_value(operations).context("operations must be a list of patch operations")?;
    let tokens = match tokens {
        Some(raw) => DesignTokens::from_value(raw).context("design tokens must be an object")?,
        None => DesignTokens::new(),
    };

    let outcome = apply_patch(&spec, &tokens, &operations);
    let validation = validate(&outcome.spec);
    tracing::debug!(
        operations = operations.len(),
        errors = outcome.errors.len(),
        score = validation.score,
        "patch applied"
    );
    Ok(PatchReport {
        spec: outcome.spec,
        tokens: outcome.tokens,
        errors: outcome.errors,
        validation,
    })
}
