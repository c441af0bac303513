//! Error types for the override registry
//!
//! Registry operations fail in exactly one way: looking up a key whose base
//! was never registered. Extension loading has its own error type, but that
//! error never leaves [`OverrideRegistry::get`](crate::OverrideRegistry::get).
//! It degrades to the base value and is logged at debug level.

use crate::key::CapabilityKey;

/// Errors returned by registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No base implementation was ever registered for the key
    #[error("registry entry not found: {0}")]
    EntryNotFound(CapabilityKey),
}

impl RegistryError {
    /// Key that triggered the error
    #[inline]
    #[must_use]
    pub fn key(&self) -> &CapabilityKey {
        match self {
            Self::EntryNotFound(key) => key,
        }
    }
}

/// Extension load failure
///
/// Produced by [`ExtensionLoader`](crate::ExtensionLoader) implementations.
/// Swallowed at the registry boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// Nothing exists at the requested location
    #[error("extension not found at {location}")]
    Missing {
        /// Where the loader looked
        location: String,
    },

    /// Something exists but could not be read or decoded
    #[error("extension at {location} is invalid: {reason}")]
    Invalid {
        /// Where the loader looked
        location: String,
        /// Decoder message
        reason: String,
    },

    /// Loader-specific failure
    #[error("extension load failed: {0}")]
    Failed(String),
}

impl LoadError {
    /// Create missing-location error
    pub fn missing(location: impl Into<String>) -> Self {
        Self::Missing {
            location: location.into(),
        }
    }

    /// Create invalid-content error
    pub fn invalid(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Invalid {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Create generic failure
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Whether the failure means "no extension here" rather than a broken one
    #[inline]
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Invalid capability key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Key string was empty
    #[error("capability key must not be empty")]
    Empty,

    /// Key did not match `<namespace>:<name>`
    #[error("capability key is malformed: '{0}' (expected '<namespace>:<name>')")]
    Malformed(String),
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_not_found_display() {
        let key: CapabilityKey = "nonexistent:key".parse().unwrap();
        let err = RegistryError::EntryNotFound(key.clone());
        assert_eq!(err.to_string(), "registry entry not found: nonexistent:key");
        assert_eq!(err.key(), &key);
    }

    #[test]
    fn load_error_display() {
        let err = LoadError::missing("extensions/theme.json");
        assert_eq!(
            err.to_string(),
            "extension not found at extensions/theme.json"
        );
        assert!(err.is_missing());

        let err = LoadError::invalid("extensions/theme.json", "expected value at line 1");
        assert!(err.to_string().contains("is invalid"));
        assert!(!err.is_missing());
    }

    #[test]
    fn key_error_display() {
        assert_eq!(
            KeyError::Empty.to_string(),
            "capability key must not be empty"
        );
        assert!(KeyError::Malformed("core".into())
            .to_string()
            .contains("'core'"));
    }
}
