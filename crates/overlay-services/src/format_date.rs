//! Date formatting (`utils:formatDate`)
//!
//! A callable service: the base renders a short human date and ignores any
//! requested pattern; extensions swap the function.

use crate::error::DateParseError;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::{self, Debug, Formatter, Write};
use std::sync::Arc;

/// Pattern used by the base formatter (`Jan 5, 2024`)
pub const BASE_PATTERN: &str = "%b %-d, %Y";

type FormatFn = dyn Fn(DateTime<Utc>, Option<&str>) -> String + Send + Sync;

/// Date formatting function
#[derive(Clone)]
pub struct FormatDate {
    name: &'static str,
    func: Arc<FormatFn>,
}

impl FormatDate {
    /// Wrap a formatting function
    pub fn new<F>(name: &'static str, func: F) -> Self
    where
        F: Fn(DateTime<Utc>, Option<&str>) -> String + Send + Sync + 'static,
    {
        Self {
            name,
            func: Arc::new(func),
        }
    }

    /// Base formatter; the pattern argument is ignored
    #[must_use]
    pub fn base() -> Self {
        Self::new("base", |date, _| render(date, BASE_PATTERN))
    }

    /// Formatter honoring `strftime` patterns, with a fallback pattern
    ///
    /// An unusable pattern renders with the fallback instead.
    #[must_use]
    pub fn patterned(fallback: &'static str) -> Self {
        Self::new("patterned", move |date, pattern| {
            pattern
                .and_then(|p| try_render(date, p))
                .unwrap_or_else(|| render(date, fallback))
        })
    }

    /// Format a timestamp
    #[must_use]
    pub fn format(&self, date: DateTime<Utc>, pattern: Option<&str>) -> String {
        (self.func)(date, pattern)
    }

    /// Parse then format a textual date
    ///
    /// # Errors
    /// [`DateParseError`] when the input is neither RFC 3339 nor `YYYY-MM-DD`
    pub fn format_str(&self, input: &str, pattern: Option<&str>) -> Result<String, DateParseError> {
        Ok(self.format(parse_date_input(input)?, pattern))
    }

    /// Label of the wrapped function
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for FormatDate {
    fn default() -> Self {
        Self::base()
    }
}

impl Debug for FormatDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FormatDate").field(&self.name).finish()
    }
}

/// Parse RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC)
///
/// # Errors
/// [`DateParseError`] for anything else
pub fn parse_date_input(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = input.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DateParseError {
            input: input.to_string(),
        })
}

fn try_render(date: DateTime<Utc>, pattern: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(pattern)).ok()?;
    Some(out)
}

fn render(date: DateTime<Utc>, pattern: &str) -> String {
    try_render(date, pattern).unwrap_or_else(|| date.to_rfc3339())
}
