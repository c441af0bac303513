//! Overlay Discovery
//!
//! Startup discovery of capability extensions. A [`DiscoveryManifest`] lists
//! one [`ExtensionProvider`] per capability key; [`discover`] tries them all
//! concurrently and registers a resolved loader for every extension found.
//!
//! Absence is the normal case: a missing extension is logged at debug level
//! and the base implementation is used.
//!
//! # Example
//!
//! ```rust
//! use overlay_discovery::{discover, DiscoveryManifest, StaticProvider};
//! use overlay_registry::{well_known, Implementation, OverrideRegistry};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = OverrideRegistry::new();
//! registry.register_base(well_known::query_config(), Implementation::data(json!({"retry": 3})));
//!
//! let manifest = DiscoveryManifest::new().with_provider(StaticProvider::new(
//!     well_known::query_config(),
//!     "builtin",
//!     Implementation::data(json!({"retry": 5})),
//! ))?;
//!
//! let report = discover(&registry, &manifest).await;
//! assert!(report.is_registered(&well_known::query_config()));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod discover;
pub mod manifest;
pub mod provider;

pub use discover::{discover, load_extension, DiscoveryReport, DiscoveryOutcome};
pub use manifest::{DiscoveryManifest, ManifestError};
pub use provider::{
    ChainProvider, DocumentFormat, ExtensionProvider, FileProvider, StaticProvider,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
