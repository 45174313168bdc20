//! Pipeline configuration

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Tunables shared by every pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Columns of generated grid layouts
    pub grid_columns: u32,
    /// Gap between grid cells in pixels
    pub grid_gap: u32,
    /// Minimum validation score for the hard gate
    pub validation_gate_threshold: f64,
    /// Mapping confidence below which a warning is logged
    pub mapping_confidence_floor: f64,
    /// Recent events sampled by schema analysis
    pub schema_sample_size: usize,
    /// Sample size at which the summary's volume term saturates
    pub summary_target_sample: usize,
    /// Field count at which the summary's coverage term saturates
    pub summary_target_fields: usize,
    /// Stored events a source needs before mapping may run
    pub min_ready_events: usize,
    /// Events fetched by a backfill that names no limit
    pub backfill_limit: usize,
    pub preview_base_url: String,
    pub portal_base_url: String,
    pub default_style_bundle: String,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_grid(mut self, columns: u32, gap: u32) -> Self {
        self.grid_columns = columns;
        self.grid_gap = gap;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_gate_threshold(mut self, threshold: f64) -> Self {
        self.validation_gate_threshold = threshold;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_min_ready_events(mut self, count: usize) -> Self {
        self.min_ready_events = count;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_schema_sample_size(mut self, size: usize) -> Self {
        self.schema_sample_size = size;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_base_urls(mut self, preview: impl Into<String>, portal: impl Into<String>) -> Self {
        self.preview_base_url = preview.into();
        self.portal_base_url = portal.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_default_style_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.default_style_bundle = bundle.into();
        self
    }

    /// Reject values no pipeline can work with
    ///
    /// # Errors
    /// Returns `CoreError::Config` naming the first bad field
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.grid_columns == 0 {
            return Err(CoreError::Config("grid_columns must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.validation_gate_threshold) {
            return Err(CoreError::Config(
                "validation_gate_threshold must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mapping_confidence_floor) {
            return Err(CoreError::Config(
                "mapping_confidence_floor must be within [0, 1]".into(),
            ));
        }
        if self.schema_sample_size == 0 || self.summary_target_sample == 0 || self.summary_target_fields == 0 {
            return Err(CoreError::Config("sample sizes must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid_columns: 12,
            grid_gap: 16,
            validation_gate_threshold: dash_spec::DEFAULT_GATE_THRESHOLD,
            mapping_confidence_floor: 0.7,
            schema_sample_size: 200,
            summary_target_sample: 50,
            summary_target_fields: 8,
            min_ready_events: 1,
            backfill_limit: 100,
            preview_base_url: "https://app.dashforge.local/preview".into(),
            portal_base_url: "https://portal.dashforge.local".into(),
            default_style_bundle: crate::render::DEFAULT_STYLE_BUNDLE.into(),
        }
    }
}
