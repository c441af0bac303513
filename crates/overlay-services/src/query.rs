//! Query client defaults (`core:query-config`)
//!
//! Registered as data so an extension document only has to name the fields
//! it changes.

use overlay_registry::{structural_merge, ConversionError, Implementation};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Defaults for queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryDefaults {
    /// Retry attempts for a failed query
    pub retry: u32,
    /// Refetch when the window regains focus
    pub refetch_on_window_focus: bool,
    /// How long a result stays fresh
    #[serde(rename = "staleTime")]
    pub stale_time_ms: u64,
    /// How long an unused result is kept
    #[serde(rename = "gcTime")]
    pub gc_time_ms: u64,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            retry: 3,
            refetch_on_window_focus: false,
            stale_time_ms: 5 * 60 * 1_000,
            gc_time_ms: 10 * 60 * 1_000,
        }
    }
}

/// Defaults for mutations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MutationDefaults {
    /// Retry attempts for a failed mutation
    pub retry: u32,
}

impl Default for MutationDefaults {
    fn default() -> Self {
        Self { retry: 1 }
    }
}

/// Query client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryConfig {
    /// Query defaults
    pub queries: QueryDefaults,
    /// Mutation defaults
    pub mutations: MutationDefaults,
}

impl QueryConfig {
    /// Fresh-result window
    #[must_use]
    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.queries.stale_time_ms)
    }

    /// Unused-result retention
    #[must_use]
    pub fn gc_time(&self) -> Duration {
        Duration::from_millis(self.queries.gc_time_ms)
    }

    /// Apply a partial update
    ///
    /// Nested sections merge, so `{"queries": {"retry": 5}}` leaves the other
    /// query defaults and all mutation defaults alone.
    ///
    /// # Errors
    /// [`ConversionError::Decode`] when the update gives a field the wrong type;
    /// the config is left unchanged.
    pub fn update(&mut self, updates: &JsonValue) -> Result<(), ConversionError> {
        let current = serde_json::to_value(&*self).map_err(ConversionError::Encode)?;
        let merged = structural_merge(&current, updates);
        *self = serde_json::from_value(merged).map_err(ConversionError::Decode)?;
        Ok(())
    }

    /// Registry form
    ///
    /// # Errors
    /// [`ConversionError::Encode`] if serialization fails
    pub fn to_implementation(&self) -> Result<Implementation, ConversionError> {
        Implementation::from_typed(self)
    }
}
