//! Interactive editing of persisted interfaces
//!
//! Each accepted edit appends a new immutable version; earlier versions stay
//! addressable for preview and deployment.

use std::sync::Arc;

use dash_spec::{apply_patch, PatchError, PatchOperation, SpecValidator, ValidationResult};
use serde::Serialize;

use crate::error::{CoreError, StoreError};
use crate::store::SpecStore;
use crate::types::{InterfaceId, InterfaceVersion, VersionId};

/// Result of an accepted edit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub interface_id: InterfaceId,
    pub base_version_id: VersionId,
    pub version_id: VersionId,
    pub validation: ValidationResult,
    /// Operations that named unknown components or bad token paths
    pub patch_errors: Vec<PatchError>,
}

pub struct InterfaceEditor {
    specs: Arc<dyn SpecStore>,
    validator: SpecValidator,
}

impl InterfaceEditor {
    #[must_use]
    pub fn new(specs: Arc<dyn SpecStore>, gate_threshold: f64) -> Self {
        Self {
            specs,
            validator: SpecValidator::with_threshold(gate_threshold),
        }
    }

    /// Patch the current version and append the result
    ///
    /// # Errors
    /// - `CoreError::Store(NotFound)` if the interface or its versions are missing
    /// - `CoreError::Gate` if the patched spec fails validation; nothing is
    ///   written then
    pub async fn apply_patch(
        &self,
        tenant_id: &str,
        interface_id: InterfaceId,
        operations: &[PatchOperation],
    ) -> Result<EditOutcome, CoreError> {
        if self.specs.interface(tenant_id, interface_id).await?.is_none() {
            return Err(StoreError::not_found("interface", interface_id).into());
        }
        let current = self
            .specs
            .latest_version(interface_id)
            .await?
            .ok_or_else(|| StoreError::not_found("interface version", interface_id))?;

        let patched = apply_patch(&current.spec_json, &current.design_tokens, operations);
        if !patched.is_clean() {
            tracing::warn!(interface = %interface_id, errors = patched.errors.len(), "patch applied with errors");
        }
        let validation = self.validator.check(&patched.spec)?;

        let version = InterfaceVersion::new(interface_id, patched.spec, patched.tokens);
        let version_id = version.id;
        self.specs.append_version(version).await?;
        tracing::info!(interface = %interface_id, base = %current.id, version = %version_id, "interface edited");

        Ok(EditOutcome {
            interface_id,
            base_version_id: current.id,
            version_id,
            validation,
            patch_errors: patched.errors,
        })
    }
}
