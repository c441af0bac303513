//! Overlay Application
//!
//! Wires configuration, tracing, base services and extension discovery into
//! a ready [`App`]. The `overlay` binary is a thin CLI over this crate.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod app;
pub mod config;
pub mod extensions;
pub mod telemetry;

pub use app::{
    describe, extension_stem, file_backed_keys, locate_document, App, AppBuilder, BootstrapError,
    EntrySummary,
};
pub use self::config::{env_source, AppConfig, ConfigError, EnvIssue, Mode, ENV_PREFIX};
pub use telemetry::init_tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
