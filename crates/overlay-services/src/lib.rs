//! Overlay Services
//!
//! The application services that participate in the override scheme. Each
//! owns a capability key, a base registered by [`install_bases`], and an
//! accessor that resolves the effective instance:
//!
//! | Key | Kind | Base |
//! |-----|------|------|
//! | `core:logger` | service | [`Logger`] at info level |
//! | `core:http-client` | service | [`HttpClient`] on `/api` |
//! | `core:query-config` | data | [`QueryConfig`] defaults |
//! | `core:ui-provider` | data | [`ThemeConfig`] defaults |
//! | `core:config-menu` | data | [`MenuConfig`] default routes |
//! | `utils:formatDate` | service | [`FormatDate::base`] |
//!
//! Accessors use the merged value only when an extension loader exists for
//! the key, so a deployment without extensions never pays for resolution.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod format_date;
pub mod http;
pub mod install;
pub mod logger;
pub mod menu;
pub mod query;
pub mod ui;

pub use error::{DateParseError, HttpError, ServiceError, TransportError};
pub use format_date::{parse_date_input, FormatDate};
pub use http::{
    DefaultErrorHandler, DetachedTransport, ErrorDisposition, ErrorHandler, HttpClient, HttpConfig,
    MemoryTokenStore, Method, Request, RequestHook, Response, TokenSource, Transport,
};
pub use install::{
    effective, format_date, http_client, install_bases, logger, menu, query_config, resolve_data,
    resolve_service, theme, ServicesConfig,
};
pub use logger::{
    prefix_formatter, ErrorReport, ErrorReporter, LogContext, LogEntry, LogLevel, Logger,
    LoggerConfig, LoggerHooks,
};
pub use menu::{MenuConfig, MenuItem};
pub use query::{MutationDefaults, QueryConfig, QueryDefaults};
pub use ui::{ThemeAlgorithm, ThemeConfig, ThemeToken};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
