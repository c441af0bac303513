//! Error reporting
//!
//! One place where error-level events leave the process (crash reporter,
//! error tracker). With no reporter installed the report is only logged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Severity of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    /// Recoverable problem
    Warn,
    /// Failure
    #[default]
    Error,
}

/// Payload handed to a reporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Summary line
    pub message: String,
    /// Error text or trace, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Structured context
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, JsonValue>,
    /// Severity
    #[serde(default)]
    pub level: ReportLevel,
}

impl ErrorReport {
    /// Error-level report with no detail or context
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
            context: Map::new(),
            level: ReportLevel::Error,
        }
    }

    /// Attach detail text
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach context
    #[must_use]
    pub fn with_context(mut self, context: Map<String, JsonValue>) -> Self {
        self.context = context;
        self
    }

    /// Set severity
    #[must_use]
    pub fn with_level(mut self, level: ReportLevel) -> Self {
        self.level = level;
        self
    }
}

/// Report sink (e.g. a crash-reporting client)
pub type ErrorReporter = Arc<dyn Fn(&ErrorReport) + Send + Sync>;

/// Deliver a report
///
/// A panicking reporter is contained: the panic is logged and the caller
/// carries on.
pub fn report_error(reporter: Option<&ErrorReporter>, report: &ErrorReport) {
    let Some(reporter) = reporter else {
        tracing::error!(
            message = %report.message,
            detail = report.detail.as_deref().unwrap_or_default(),
            "unreported error"
        );
        return;
    };

    if catch_unwind(AssertUnwindSafe(|| reporter(report))).is_err() {
        tracing::error!(message = %report.message, "error reporter panicked");
    }
}
