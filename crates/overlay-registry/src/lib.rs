//! Overlay Registry
//!
//! Lets a derived implementation shadow a base implementation without touching
//! the base. Each capability key maps to:
//!
//! - a **base**, registered eagerly at startup;
//! - an optional **extension**, produced lazily by an [`ExtensionLoader`];
//! - a cached **merged** value combining the two.
//!
//! # Merge precedence
//!
//! Services and non-structured data are replaced by their extension;
//! key/value structures are merged recursively with the extension winning at
//! every level. See [`merge`].
//!
//! # Example
//!
//! ```rust
//! use overlay_registry::{CapabilityKey, Implementation, OverrideRegistry, ResolvedLoader};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = OverrideRegistry::new();
//! let key = CapabilityKey::new("core", "query-config")?;
//!
//! registry.register_base(key.clone(), Implementation::data(json!({"retry": 3, "gc": 600})));
//! registry.register_extension_loader(
//!     key.clone(),
//!     ResolvedLoader::new(Implementation::data(json!({"retry": 5}))),
//! );
//!
//! let effective = registry.get(&key).await?;
//! assert_eq!(effective.as_data(), Some(&json!({"retry": 5, "gc": 600})));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod key;
pub mod loader;
pub mod merge;
pub mod registry;
pub mod value;

// Re-exports for convenience
pub use error::{KeyError, LoadError, RegistryError, RegistryResult};
pub use key::{well_known, CapabilityKey};
pub use loader::{ExtensionLoader, FnLoader, LoadResult, ResolvedLoader};
pub use merge::{remove_marker, resolve, structural_merge};
pub use registry::{OverrideRegistry, RegistryStats, DEFAULT_CACHE_CAPACITY};
pub use value::{ConversionError, Implementation, ImplementationKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the registry
    pub use crate::{
        well_known, CapabilityKey, ExtensionLoader, Implementation, LoadError, OverrideRegistry,
        RegistryError, ResolvedLoader,
    };
}
