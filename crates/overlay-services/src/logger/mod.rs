//! Application logger (`core:logger`)
//!
//! A leveled logger with a persistent context. Console output becomes
//! `tracing` events at the matching level. Extension loggers are built from
//! the same type plus [`LoggerHooks`]: a formatter that wraps the base line
//! and handlers that observe every error.

mod report;

pub use report::{report_error, ErrorReport, ErrorReporter, ReportLevel};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt::{self, Debug, Display, Formatter as FmtFormatter};
use std::str::FromStr;
use std::sync::Arc;

/// Structured log context
pub type LogContext = Map<String, JsonValue>;

/// Severity threshold, ordered from most to least verbose
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostics
    Debug,
    /// Normal operation
    #[default]
    Info,
    /// Recoverable problems
    Warn,
    /// Failures
    Error,
    /// Nothing is logged
    None,
}

impl LogLevel {
    /// Uppercase label used in formatted lines
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::None => "NONE",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "none" | "off" => Ok(Self::None),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerConfig {
    /// Minimum level emitted
    pub level: LogLevel,
    /// Emit formatted lines as tracing events
    pub enable_console: bool,
    /// Context attached to every entry
    pub context: LogContext,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_console: true,
            context: LogContext::new(),
        }
    }
}

/// One log event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Persistent context merged with per-call context
    pub context: LogContext,
    /// Error text for error-level entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wraps the base-formatted line
pub type Formatter = Arc<dyn Fn(&LogEntry, String) -> String + Send + Sync>;

/// Observes every error-level entry
pub type ErrorHook = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// Receives every emitted entry with its formatted line
pub type LogSink = Arc<dyn Fn(&LogEntry, &str) + Send + Sync>;

/// Behavior layered over the base logger
#[derive(Clone, Default)]
pub struct LoggerHooks {
    /// Line formatter applied after the base format
    pub formatter: Option<Formatter>,
    /// Error observers, in registration order
    pub error_handlers: Vec<ErrorHook>,
    /// Extra destinations, in registration order
    pub sinks: Vec<LogSink>,
}

impl LoggerHooks {
    /// No hooks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the formatter
    #[must_use]
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Add an error observer
    #[must_use]
    pub fn with_error_handler(mut self, handler: ErrorHook) -> Self {
        self.error_handlers.push(handler);
        self
    }

    /// Add a destination
    #[must_use]
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Debug for LoggerHooks {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerHooks")
            .field("formatter", &self.formatter.is_some())
            .field("error_handlers", &self.error_handlers.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Formatter prefixing every line, e.g. `[App]`
#[must_use]
pub fn prefix_formatter(prefix: impl Into<String>) -> Formatter {
    let prefix = prefix.into();
    Arc::new(move |_, line| format!("{prefix} {line}"))
}

/// Leveled logger with persistent context
pub struct Logger {
    config: RwLock<LoggerConfig>,
    hooks: LoggerHooks,
    reporter: RwLock<Option<ErrorReporter>>,
}

impl Logger {
    /// Base logger
    #[must_use]
    pub fn new(config: LoggerConfig) -> Self {
        Self::with_hooks(config, LoggerHooks::default())
    }

    /// Logger with layered behavior
    #[must_use]
    pub fn with_hooks(config: LoggerConfig, hooks: LoggerHooks) -> Self {
        Self {
            config: RwLock::new(config),
            hooks,
            reporter: RwLock::new(None),
        }
    }

    /// Log at debug level
    pub fn debug(&self, message: &str, context: Option<&LogContext>) {
        self.log(LogLevel::Debug, message, context, None);
    }

    /// Log at info level
    pub fn info(&self, message: &str, context: Option<&LogContext>) {
        self.log(LogLevel::Info, message, context, None);
    }

    /// Log at warn level
    pub fn warn(&self, message: &str, context: Option<&LogContext>) {
        self.log(LogLevel::Warn, message, context, None);
    }

    /// Log at error level
    ///
    /// Error handlers run and the report is forwarded to the installed
    /// [`ErrorReporter`], if any. The reporter may replace itself.
    pub fn error(
        &self,
        message: &str,
        error: Option<&dyn std::error::Error>,
        context: Option<&LogContext>,
    ) {
        let detail = error.map(ToString::to_string);
        let Some(entry) = self.log(LogLevel::Error, message, context, detail) else {
            return;
        };

        for handler in &self.hooks.error_handlers {
            handler(&entry);
        }

        let reporter = self.reporter.read().clone();
        if let Some(reporter) = reporter {
            let mut report =
                ErrorReport::new(entry.message.clone()).with_context(entry.context.clone());
            report.detail = entry.error.clone();
            report_error(Some(&reporter), &report);
        }
    }

    /// Change the minimum level
    pub fn set_level(&self, level: LogLevel) {
        self.config.write().level = level;
    }

    /// Merge into the persistent context
    pub fn set_context(&self, context: LogContext) {
        self.config.write().context.extend(context);
    }

    /// Install the error reporter
    pub fn set_error_reporter(&self, reporter: ErrorReporter) {
        *self.reporter.write() = Some(reporter);
    }

    /// Snapshot of the current configuration
    #[must_use]
    pub fn config(&self) -> LoggerConfig {
        self.config.read().clone()
    }

    /// Whether a level passes the threshold
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level >= self.config.read().level
    }

    /// Render an entry as a console line
    ///
    /// `[timestamp] [LEVEL] message {context}`, then the hook formatter.
    #[must_use]
    pub fn format_message(&self, entry: &LogEntry) -> String {
        let mut line = format!(
            "[{}] [{}] {}",
            entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            entry.level,
            entry.message
        );
        if !entry.context.is_empty() {
            line.push(' ');
            line.push_str(&JsonValue::Object(entry.context.clone()).to_string());
        }
        match &self.hooks.formatter {
            Some(formatter) => formatter(entry, line),
            None => line,
        }
    }

    fn log(
        &self,
        level: LogLevel,
        message: &str,
        context: Option<&LogContext>,
        error: Option<String>,
    ) -> Option<LogEntry> {
        if !self.enabled(level) {
            return None;
        }

        let (mut merged, console) = {
            let config = self.config.read();
            (config.context.clone(), config.enable_console)
        };
        if let Some(context) = context {
            merged.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let entry = LogEntry {
            level,
            message: message.to_string(),
            timestamp: Utc::now(),
            context: merged,
            error,
        };
        let line = self.format_message(&entry);

        if console {
            emit(level, &line, entry.error.as_deref());
        }
        for sink in &self.hooks.sinks {
            sink(&entry, &line);
        }
        Some(entry)
    }
}

fn emit(level: LogLevel, line: &str, error: Option<&str>) {
    match level {
        LogLevel::Debug => tracing::debug!(target: "overlay::app", "{line}"),
        LogLevel::Info => tracing::info!(target: "overlay::app", "{line}"),
        LogLevel::Warn => tracing::warn!(target: "overlay::app", "{line}"),
        LogLevel::Error => match error {
            Some(error) => tracing::error!(target: "overlay::app", error, "{line}"),
            None => tracing::error!(target: "overlay::app", "{line}"),
        },
        LogLevel::None => {}
    }
}

impl Debug for Logger {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("config", &*self.config.read())
            .field("hooks", &self.hooks)
            .field("reporter", &self.reporter.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn capture(hooks: LoggerHooks) -> (LoggerHooks, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let hooks = hooks.with_sink(Arc::new(move |_: &LogEntry, line: &str| {
            sink.lock().push(line.to_string());
        }));
        (hooks, lines)
    }

    fn ctx(value: JsonValue) -> LogContext {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::None);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn threshold_filters_entries() {
        let (hooks, lines) = capture(LoggerHooks::new());
        let logger = Logger::with_hooks(LoggerConfig::default(), hooks);

        logger.debug("hidden", None);
        logger.info("shown", None);
        logger.set_level(LogLevel::None);
        logger.error("also hidden", None, None);

        let lines = lines.lock();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[INFO] shown"));
    }

    #[test]
    fn context_is_merged_into_entries() {
        let (hooks, lines) = capture(LoggerHooks::new());
        let config = LoggerConfig {
            context: ctx(json!({"app": "base"})),
            ..LoggerConfig::default()
        };
        let logger = Logger::with_hooks(config, hooks);

        logger.set_context(ctx(json!({"user": 7})));
        logger.warn("slow", Some(&ctx(json!({"ms": 900}))));

        assert_eq!(
            logger.config().context,
            ctx(json!({"app": "base", "user": 7}))
        );
        assert!(lines.lock()[0].ends_with(r#"[WARN] slow {"app":"base","ms":900,"user":7}"#));
    }

    #[test]
    fn formatter_wraps_base_line() {
        let (hooks, lines) = capture(LoggerHooks::new().with_formatter(prefix_formatter("[App]")));
        let logger = Logger::with_hooks(LoggerConfig::default(), hooks);

        logger.info("ready", None);
        let line = lines.lock()[0].clone();
        assert!(line.starts_with("[App] ["));
        assert!(line.ends_with("[INFO] ready"));
    }

    #[test]
    fn error_runs_handlers_and_reporter() {
        let tracked = Arc::new(Mutex::new(Vec::new()));
        let reported = Arc::new(Mutex::new(Vec::new()));

        let tracker = Arc::clone(&tracked);
        let hooks = LoggerHooks::new().with_error_handler(Arc::new(move |entry: &LogEntry| {
            tracker.lock().push(entry.message.clone());
        }));
        let logger = Logger::with_hooks(LoggerConfig::default(), hooks);

        let sink = Arc::clone(&reported);
        logger.set_error_reporter(Arc::new(move |report: &ErrorReport| {
            sink.lock().push(report.clone());
        }));

        let cause = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        logger.error("save failed", Some(&cause), None);

        assert_eq!(*tracked.lock(), vec!["save failed".to_string()]);
        let reported = reported.lock();
        assert_eq!(reported[0].message, "save failed");
        assert_eq!(reported[0].detail.as_deref(), Some("disk full"));
    }

    #[test]
    fn reporter_can_replace_itself() {
        let logger = Arc::new(Logger::new(LoggerConfig::default()));
        let reported = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&logger);
        let sink = Arc::clone(&reported);
        logger.set_error_reporter(Arc::new(move |report: &ErrorReport| {
            sink.lock().push(format!("first: {}", report.message));
            if let Some(logger) = weak.upgrade() {
                let sink = Arc::clone(&sink);
                logger.set_error_reporter(Arc::new(move |report: &ErrorReport| {
                    sink.lock().push(format!("second: {}", report.message));
                }));
            }
        }));

        logger.error("one", None, None);
        logger.error("two", None, None);

        assert_eq!(
            *reported.lock(),
            vec!["first: one".to_string(), "second: two".to_string()]
        );
    }

    #[test]
    fn panicking_reporter_does_not_escape_logger() {
        let logger = Logger::new(LoggerConfig::default());
        logger.set_error_reporter(Arc::new(|_: &ErrorReport| panic!("reporter down")));
        logger.error("still fine", None, None);
        logger.info("after", None);
    }

    #[test]
    fn config_deserializes_camel_case() {
        let config: LoggerConfig =
            serde_json::from_value(json!({"level": "debug", "enableConsole": false})).unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.enable_console);
        assert!(config.context.is_empty());
    }
}
