//! Core types for Dash Core
//!
//! Defines the persisted entities shared by the pipelines:
//! - identifiers
//! - platform types and their categories
//! - interfaces, versions and deployments
//! - todos

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dash_spec::{DashboardSpec, DesignTokens};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Interface identifier
    InterfaceId
);
uuid_id!(
    /// Interface version identifier
    VersionId
);
uuid_id!(
    /// Deployment identifier
    DeploymentId
);
uuid_id!(
    /// Todo identifier
    TodoId
);

/// Connected telemetry platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Vapi,
    Retell,
    N8n,
    Make,
}

/// Kind of telemetry a platform emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformCategory {
    VoiceAgent,
    WorkflowAutomation,
    AutomationBuilder,
}

impl PlatformType {
    pub const ALL: [PlatformType; 4] = [Self::Vapi, Self::Retell, Self::N8n, Self::Make];

    #[must_use]
    pub fn category(self) -> PlatformCategory {
        match self {
            Self::Vapi | Self::Retell => PlatformCategory::VoiceAgent,
            Self::N8n => PlatformCategory::WorkflowAutomation,
            Self::Make => PlatformCategory::AutomationBuilder,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vapi => "vapi",
            Self::Retell => "retell",
            Self::N8n => "n8n",
            Self::Make => "make",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown platform type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceStatus {
    Draft,
    Published,
}

/// A generated dashboard owned by a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub id: InterfaceId,
    pub tenant_id: String,
    pub name: String,
    pub status: InterfaceStatus,
    pub active_version_id: Option<VersionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interface {
    #[must_use]
    pub fn draft(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: InterfaceId::new(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            status: InterfaceStatus::Draft,
            active_version_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable snapshot of a spec and its tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceVersion {
    pub id: VersionId,
    pub interface_id: InterfaceId,
    pub spec_json: DashboardSpec,
    pub design_tokens: DesignTokens,
    pub created_at: DateTime<Utc>,
}

impl InterfaceVersion {
    #[must_use]
    pub fn new(interface_id: InterfaceId, spec: DashboardSpec, tokens: DesignTokens) -> Self {
        Self {
            id: VersionId::new(),
            interface_id,
            spec_json: spec,
            design_tokens: tokens,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Active,
    Inactive,
}

/// Publication of one interface version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: DeploymentId,
    pub tenant_id: String,
    pub interface_id: InterfaceId,
    pub preview_version_id: VersionId,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    #[must_use]
    pub fn active(tenant_id: impl Into<String>, interface_id: InterfaceId, version_id: VersionId) -> Self {
        Self {
            id: DeploymentId::new(),
            tenant_id: tenant_id.into(),
            interface_id,
            preview_version_id: version_id,
            status: DeploymentStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == DeploymentStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Open,
    Done,
}

/// Follow-up item shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub tenant_id: String,
    pub thread_id: String,
    pub kind: String,
    pub title: String,
    /// Interface or source the todo is about
    pub subject_id: Option<String>,
    pub status: TodoStatus,
}

impl Todo {
    #[must_use]
    pub fn open(
        tenant_id: impl Into<String>,
        thread_id: impl Into<String>,
        kind: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: TodoId::new(),
            tenant_id: tenant_id.into(),
            thread_id: thread_id.into(),
            kind: kind.into(),
            title: title.into(),
            subject_id: None,
            status: TodoStatus::Open,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }
}
