//! Theme configuration (`core:ui-provider`)

use overlay_registry::{ConversionError, Implementation};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Design tokens
///
/// Unknown tokens from an extension are kept in `extra` so they survive the
/// typed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeToken {
    /// Primary brand color
    pub color_primary: String,
    /// Corner radius in pixels
    pub border_radius: u32,
    /// Font stack
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// Any other token
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl Default for ThemeToken {
    fn default() -> Self {
        Self {
            color_primary: "#1890ff".to_string(),
            border_radius: 6,
            font_family: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Color algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeAlgorithm {
    /// Light palette
    #[default]
    Default,
    /// Dark palette
    Dark,
    /// Dense spacing
    Compact,
}

/// Theme handed to the UI layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeConfig {
    /// Design tokens
    pub token: ThemeToken,
    /// Color algorithm
    pub algorithm: ThemeAlgorithm,
    /// Per-component overrides
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, JsonValue>,
}

impl ThemeConfig {
    /// Registry form
    ///
    /// # Errors
    /// [`ConversionError::Encode`] if serialization fails
    pub fn to_implementation(&self) -> Result<Implementation, ConversionError> {
        Implementation::from_typed(self)
    }
}
