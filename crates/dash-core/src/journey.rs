//! Journey session: per-thread phase and readiness state
//!
//! The phase sequence is advisory presentation state. Only two gates are
//! enforced elsewhere: mapping requires `schema_ready`, deployment requires
//! an explicit confirmation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{InterfaceId, PlatformType, VersionId};

/// Journey phase, ordered by position in the journey
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyMode {
    #[default]
    SelectEntity,
    Recommend,
    Style,
    BuildPreview,
    InteractiveEdit,
    Deploy,
}

impl JourneyMode {
    /// Following phase; `Deploy` is last
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::SelectEntity => Some(Self::Recommend),
            Self::Recommend => Some(Self::Style),
            Self::Style => Some(Self::BuildPreview),
            Self::BuildPreview => Some(Self::InteractiveEdit),
            Self::InteractiveEdit => Some(Self::Deploy),
            Self::Deploy => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectEntity => "select_entity",
            Self::Recommend => "recommend",
            Self::Style => "style",
            Self::BuildPreview => "build_preview",
            Self::InteractiveEdit => "interactive_edit",
            Self::Deploy => "deploy",
        }
    }
}

impl fmt::Display for JourneyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub tenant_id: String,
    pub thread_id: String,
}

impl SessionKey {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            thread_id: thread_id.into(),
        }
    }
}

/// Mutable per-(tenant, thread) journey record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneySession {
    pub tenant_id: String,
    pub thread_id: String,
    pub platform_type: Option<PlatformType>,
    pub source_id: Option<String>,
    pub entity_id: Option<String>,
    pub mode: JourneyMode,
    pub schema_ready: bool,
    pub selected_outcome: Option<String>,
    pub selected_storyboard: Option<String>,
    pub selected_style_bundle_id: Option<String>,
    pub preview_interface_id: Option<InterfaceId>,
    pub preview_version_id: Option<VersionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JourneySession {
    /// Fresh session in the first phase
    #[must_use]
    pub fn new(key: &SessionKey) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: key.tenant_id.clone(),
            thread_id: key.thread_id.clone(),
            platform_type: None,
            source_id: None,
            entity_id: None,
            mode: JourneyMode::default(),
            schema_ready: false,
            selected_outcome: None,
            selected_storyboard: None,
            selected_style_bundle_id: None,
            preview_interface_id: None,
            preview_version_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.tenant_id.clone(), self.thread_id.clone())
    }

    pub fn set_mode(&mut self, mode: JourneyMode) {
        if self.mode != mode {
            tracing::debug!(thread = %self.thread_id, from = %self.mode, to = %mode, "journey mode changed");
        }
        self.mode = mode;
        self.touch();
    }

    /// Move forward to `mode`; a session already at or past it keeps its phase
    pub fn advance_to(&mut self, mode: JourneyMode) -> JourneyMode {
        if self.mode < mode {
            self.set_mode(mode);
        }
        self.mode
    }

    /// Move to the following phase; stays put at the end
    pub fn advance(&mut self) -> JourneyMode {
        if let Some(next) = self.mode.next() {
            self.set_mode(next);
        }
        self.mode
    }

    pub fn bind_source(&mut self, platform: PlatformType, source_id: impl Into<String>, entity_id: Option<String>) {
        self.platform_type = Some(platform);
        self.source_id = Some(source_id.into());
        if entity_id.is_some() {
            self.entity_id = entity_id;
        }
        self.touch();
    }

    pub fn set_schema_ready(&mut self, ready: bool) {
        self.schema_ready = ready;
        self.touch();
    }

    /// Schema is ready and was built from `source_id`
    #[must_use]
    pub fn schema_ready_for(&self, source_id: &str) -> bool {
        self.schema_ready && self.source_id.as_deref() == Some(source_id)
    }

    pub fn select_outcome(&mut self, outcome: impl Into<String>) {
        self.selected_outcome = Some(outcome.into());
        self.touch();
    }

    pub fn select_storyboard(&mut self, storyboard: impl Into<String>) {
        self.selected_storyboard = Some(storyboard.into());
        self.touch();
    }

    pub fn select_style_bundle(&mut self, bundle_id: impl Into<String>) {
        self.selected_style_bundle_id = Some(bundle_id.into());
        self.touch();
    }

    pub fn set_preview(&mut self, interface_id: InterfaceId, version_id: VersionId) {
        self.preview_interface_id = Some(interface_id);
        self.preview_version_id = Some(version_id);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
