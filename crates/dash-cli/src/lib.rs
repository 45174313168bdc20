//! Dashforge command line
//!
//! Thin wrappers over `dash-spec` and `dash-core` used by the `dashforge`
//! binary: validate and patch spec files, and run the full pipeline chain
//! against bundled sample telemetry.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod demo;
pub mod settings;
pub mod telemetry;

pub use commands::{patch_spec, validate_spec, PatchReport};
pub use demo::{run_demo, DemoReport};
pub use settings::load_config;
pub use telemetry::init_tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
