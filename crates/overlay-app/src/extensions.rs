//! Extensions linked into the binary
//!
//! | Key | Extension |
//! |-----|-----------|
//! | `core:logger` | `[App]` prefix, error tracking, `app: extended` context |
//! | `core:ui-provider` | indigo theme with component overrides |
//! | `utils:formatDate` | honors `strftime` patterns, `DD MMM YYYY` otherwise |
//!
//! A document on disk for the same key takes precedence over these.

use overlay_discovery::StaticProvider;
use overlay_registry::{well_known, CapabilityKey, Implementation};
use overlay_services::{
    prefix_formatter, FormatDate, LogEntry, Logger, LoggerConfig, LoggerHooks,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// Location reported for linked extensions
pub const BUILTIN_LOCATION: &str = "builtin";

/// Fallback pattern of the extended date formatter (`05 Jan 2024`)
pub const EXTENDED_DATE_PATTERN: &str = "%d %b %Y";

/// Logger layered over `base`: prefixed lines and tracked errors
#[must_use]
pub fn extended_logger(base: &LoggerConfig) -> Logger {
    let mut config = base.clone();
    config.context.insert("app".to_string(), json!("extended"));

    let hooks = LoggerHooks::new()
        .with_formatter(prefix_formatter("[App]"))
        .with_error_handler(Arc::new(track_error));
    Logger::with_hooks(config, hooks)
}

fn track_error(entry: &LogEntry) {
    tracing::warn!(
        target: "overlay::tracking",
        message = %entry.message,
        error = entry.error.as_deref().unwrap_or_default(),
        "error tracked"
    );
}

/// Theme extension document
#[must_use]
pub fn extended_theme() -> JsonValue {
    json!({
        "token": {
            "colorPrimary": "#6366f1",
            "borderRadius": 8,
            "fontFamily": "Inter, system-ui, sans-serif"
        },
        "components": {
            "Button": {
                "primaryShadow": "0 2px 6px rgba(99, 102, 241, 0.35)",
                "fontWeight": 500
            },
            "Card": {
                "headerFontSize": 16
            }
        }
    })
}

/// Date formatter extension
#[must_use]
pub fn extended_format_date() -> FormatDate {
    FormatDate::patterned(EXTENDED_DATE_PATTERN)
}

/// Linked extension for a key, if one ships
#[must_use]
pub fn builtin_provider(key: &CapabilityKey, logger: &LoggerConfig) -> Option<StaticProvider> {
    let value = if *key == well_known::logger() {
        Implementation::service(extended_logger(logger))
    } else if *key == well_known::ui_provider() {
        Implementation::data(extended_theme())
    } else if *key == well_known::format_date() {
        Implementation::service(extended_format_date())
    } else {
        return None;
    };
    Some(StaticProvider::new(key.clone(), BUILTIN_LOCATION, value))
}
