//! Dashboard spec document types
//!
//! Field names are the wire names renderers and the UI read, so every
//! struct here serializes camelCase and must stay bit-compatible.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Spec document format written by generators in this workspace
pub const SPEC_FORMAT_VERSION: &str = "1.0";

/// Free-form component properties
pub type Props = Map<String, Value>;

/// Errors converting between raw JSON and typed specs
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// Document does not have the spec shape
    #[error("schema: {0}")]
    Schema(#[from] serde_json::Error),

    /// Token path is empty or has an empty segment
    #[error("invalid token path: '{0}'")]
    InvalidTokenPath(String),
}

/// Dashboard specification document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSpec {
    /// Document format version
    pub version: String,
    /// Template the spec was generated from
    pub template_id: String,
    /// Platform whose telemetry the dashboard shows
    pub platform_type: String,
    /// Grid definition
    pub layout: SpecLayout,
    /// Components in render order
    pub components: Vec<Component>,
}

impl DashboardSpec {
    /// Create an empty spec on the given layout
    #[inline]
    #[must_use]
    pub fn new(
        template_id: impl Into<String>,
        platform_type: impl Into<String>,
        layout: SpecLayout,
    ) -> Self {
        Self {
            version: SPEC_FORMAT_VERSION.to_string(),
            template_id: template_id.into(),
            platform_type: platform_type.into(),
            layout,
            components: Vec::new(),
        }
    }

    /// Parse a spec from raw JSON
    ///
    /// # Errors
    /// Returns `SpecError::Schema` if the value does not have the spec shape
    pub fn from_value(value: Value) -> Result<Self, SpecError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize to raw JSON
    ///
    /// # Errors
    /// Returns `SpecError::Schema` if a prop value cannot be represented
    pub fn to_value(&self) -> Result<Value, SpecError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Look up a component by id
    #[inline]
    #[must_use]
    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Component ids in order
    #[must_use]
    pub fn component_ids(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.id.as_str()).collect()
    }

    /// Whether the spec has anything to render
    #[inline]
    #[must_use]
    pub fn is_deployable(&self) -> bool {
        !self.components.is_empty()
    }
}

/// Grid definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecLayout {
    /// Layout kind (renderers only know `grid` today)
    #[serde(rename = "type")]
    pub kind: String,
    /// Number of grid columns
    pub columns: u32,
    /// Gap between cells in pixels
    pub gap: u32,
}

impl SpecLayout {
    /// Grid layout
    #[inline]
    #[must_use]
    pub fn grid(columns: u32, gap: u32) -> Self {
        Self {
            kind: "grid".to_string(),
            columns,
            gap,
        }
    }
}

/// Single dashboard component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Identifier, unique within a spec
    pub id: String,
    /// Renderer component type (`kpi`, `line_chart`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Renderer properties
    #[serde(default)]
    pub props: Props,
    /// Grid placement
    pub layout: GridPosition,
}

impl Component {
    /// Create component with empty props
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>, layout: GridPosition) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            props: Props::new(),
            layout,
        }
    }

    /// With a single prop
    #[inline]
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }
}

/// Zero-based grid placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub col: u32,
    pub row: u32,
    pub w: u32,
    pub h: u32,
}

impl GridPosition {
    #[inline]
    #[must_use]
    pub fn new(col: u32, row: u32, w: u32, h: u32) -> Self {
        Self { col, row, w, h }
    }

    /// Rightmost column edge (exclusive)
    #[inline]
    #[must_use]
    pub fn right_edge(&self) -> u64 {
        u64::from(self.col) + u64::from(self.w)
    }
}

/// Style-variable tree
///
/// Keys are addressed with dot paths (`theme.color.primary`). Writes
/// create intermediate objects; reads fall back to a literal flat key so
/// token maps written by older tooling still resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignTokens(Map<String, Value>);

impl DesignTokens {
    /// Empty token set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object
    #[inline]
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse tokens from raw JSON
    ///
    /// # Errors
    /// Returns `SpecError::Schema` if the value is not an object
    pub fn from_value(value: Value) -> Result<Self, SpecError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Underlying JSON object
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Raw JSON value
    #[inline]
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Whether no tokens are set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get value at dot path
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first);
        for segment in segments {
            current = current.and_then(|v| v.as_object()).and_then(|m| m.get(segment));
        }
        current.or_else(|| self.0.get(path))
    }

    /// Set value at dot path
    ///
    /// Creates intermediate objects as needed, replacing scalars that sit
    /// where an object is required.
    ///
    /// # Errors
    /// Returns `SpecError::InvalidTokenPath` for empty paths or segments
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), SpecError> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(SpecError::InvalidTokenPath(path.to_string()));
        }
        let Some((last, parents)) = segments.split_last() else {
            return Err(SpecError::InvalidTokenPath(path.to_string()));
        };

        let mut current = &mut self.0;
        for segment in parents {
            let slot = current
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = ensure_object(slot)
                .ok_or_else(|| SpecError::InvalidTokenPath(path.to_string()))?;
        }
        current.insert((*last).to_string(), value);
        Ok(())
    }
}

fn ensure_object(slot: &mut Value) -> Option<&mut Map<String, Value>> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut()
}
