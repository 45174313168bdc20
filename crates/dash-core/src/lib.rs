//! Dash Core - dashboard pipelines over platform telemetry
//!
//! Turns a connected platform source into a deployed dashboard:
//! - Backfill pulls platform history and marks the schema ready
//! - Generation analyzes the schema, picks a template, maps fields
//!   (suspending for operator input when fields are missing), renders,
//!   validates and persists a preview version
//! - Deployment revalidates, requires confirmation and publishes atomically
//! - The interface editor applies patch lists to persisted versions
//!
//! # Example
//!
//! ```rust,ignore
//! use dash_core::{BackfillInput, GenerationInput, PipelineConfig, Pipelines, PlatformType, Stores};
//! use dash_workflow::RunScope;
//!
//! # async fn example(stores: Stores) -> Result<(), Box<dyn std::error::Error>> {
//! let pipelines = Pipelines::new(&stores, PipelineConfig::new())?;
//! let scope = RunScope::new("tenant-1", "thread-1");
//!
//! pipelines.backfill.execute(scope.clone(), BackfillInput::new("src-1", PlatformType::Vapi)).await?;
//! let outcome = pipelines
//!     .generation
//!     .execute(scope, GenerationInput::new("src-1", PlatformType::Vapi))
//!     .await?;
//! println!("{:?}", outcome.status());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod audit;
pub mod config;
pub mod edit;
pub mod error;
pub mod event;
pub mod journey;
pub mod mapping;
pub mod pipelines;
pub mod render;
pub mod schema;
pub mod store;
pub mod template;
pub mod types;

pub use audit::{AuditEntry, AuditRecord, MemoryAuditLog};
pub use config::PipelineConfig;
pub use edit::{EditOutcome, InterfaceEditor};
pub use error::{CoreError, StoreError, StoreResult};
pub use event::{normalize, Event};
pub use journey::{JourneyMode, JourneySession, SessionKey};
pub use mapping::{generate_mapping, FieldMapping};
pub use pipelines::deployment::CONFIRMATION_REQUIRED;
pub use pipelines::generation::SCHEMA_NOT_READY;
pub use pipelines::{
    BackfillInput, BackfillOutput, DeployInput, DeployOutput, GenerationInput, GenerationOutput, MappingResolution,
    Pipelines, Stores,
};
pub use schema::{FieldSummary, FieldType, SchemaSummary};
pub use store::{
    AuditSink, CredentialProvider, Credentials, DeploymentStore, EventStore, FetchRequest, MemoryStore,
    PlatformEventSource, PublicationPlan, PublicationReceipt, SessionStore, SpecStore, StaticCredentials,
    StaticEventSource, TodoStore, UpsertCounts,
};
pub use template::{find_template, select_template, Template, TemplateSelection};
pub use types::{
    Deployment, DeploymentId, DeploymentStatus, Interface, InterfaceId, InterfaceStatus, InterfaceVersion,
    PlatformCategory, PlatformType, Todo, TodoId, TodoStatus, VersionId,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
