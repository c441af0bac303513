//! Capability keys
//!
//! Provides [`CapabilityKey`], the stable `"<namespace>:<name>"` identifier a
//! swappable piece of behavior is registered under.

use crate::error::KeyError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

static KEY_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9][a-z0-9_-]*):([A-Za-z0-9][A-Za-z0-9_.-]*)$")
        .expect("capability key grammar is a valid regex")
});

/// Identifier of a swappable capability
///
/// Cheap to clone. Ordering and hashing follow the full key string.
///
/// # Examples
/// - `core:logger`
/// - `core:http-client`
/// - `utils:formatDate`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapabilityKey {
    raw: Arc<str>,
    split: usize,
}

impl CapabilityKey {
    /// Build a key from its two segments
    ///
    /// # Errors
    /// Returns [`KeyError`] when either segment is empty or contains
    /// characters outside the key grammar.
    pub fn new(namespace: &str, name: &str) -> Result<Self, KeyError> {
        format!("{namespace}:{name}").parse()
    }

    /// Namespace segment (`core` in `core:logger`)
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.raw[..self.split]
    }

    /// Name segment (`logger` in `core:logger`)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.raw[self.split + 1..]
    }

    /// Full key string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Well-known key constructor; panics only on a malformed literal.
    fn known(raw: &'static str) -> Self {
        match raw.parse() {
            Ok(key) => key,
            Err(err) => unreachable!("well-known key literal {raw} is invalid: {err}"),
        }
    }
}

impl Display for CapabilityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(&self.raw)
    }
}

impl FromStr for CapabilityKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyError::Empty);
        }

        let captures = KEY_GRAMMAR
            .captures(s)
            .ok_or_else(|| KeyError::Malformed(s.to_string()))?;
        let split = captures.get(1).map_or(0, |m| m.end());

        Ok(Self {
            raw: Arc::from(s),
            split,
        })
    }
}

impl TryFrom<&str> for CapabilityKey {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl AsRef<str> for CapabilityKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for CapabilityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CapabilityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Keys of the capabilities the application ships bases for
pub mod well_known {
    use super::CapabilityKey;

    /// Application logger
    #[must_use]
    pub fn logger() -> CapabilityKey {
        CapabilityKey::known("core:logger")
    }

    /// HTTP client
    #[must_use]
    pub fn http_client() -> CapabilityKey {
        CapabilityKey::known("core:http-client")
    }

    /// Query client defaults
    #[must_use]
    pub fn query_config() -> CapabilityKey {
        CapabilityKey::known("core:query-config")
    }

    /// UI theme provider
    #[must_use]
    pub fn ui_provider() -> CapabilityKey {
        CapabilityKey::known("core:ui-provider")
    }

    /// Navigation menu
    #[must_use]
    pub fn menu() -> CapabilityKey {
        CapabilityKey::known("core:config-menu")
    }

    /// Date formatting function
    #[must_use]
    pub fn format_date() -> CapabilityKey {
        CapabilityKey::known("utils:formatDate")
    }

    /// All well-known keys, in discovery order
    #[must_use]
    pub fn all() -> Vec<CapabilityKey> {
        vec![
            logger(),
            http_client(),
            query_config(),
            ui_provider(),
            menu(),
            format_date(),
        ]
    }
}
