//! Service error types

use crate::http::ErrorDisposition;
use overlay_registry::{CapabilityKey, ConversionError, RegistryError};
use serde_json::Value as JsonValue;

/// Service resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Registry lookup failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Registered value has the wrong shape for the service
    #[error("capability {key} has an unexpected shape: {source}")]
    Conversion {
        /// Capability being resolved
        key: CapabilityKey,
        /// Underlying conversion failure
        #[source]
        source: ConversionError,
    },
}

impl ServiceError {
    pub(crate) fn conversion(key: &CapabilityKey, source: ConversionError) -> Self {
        Self::Conversion {
            key: key.clone(),
            source,
        }
    }
}

/// HTTP client errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HttpError {
    /// Server answered with a non-2xx status
    #[error("{method} {url} failed with status {status}")]
    Status {
        /// Request method
        method: &'static str,
        /// Absolute request URL
        url: String,
        /// Response status
        status: u16,
        /// Response body
        body: JsonValue,
        /// What the error handler decided
        disposition: ErrorDisposition,
    },

    /// No response received
    #[error("{method} {url}: network error: {reason}")]
    Network {
        /// Request method
        method: &'static str,
        /// Absolute request URL
        url: String,
        /// Transport message
        reason: String,
    },

    /// No response within the configured timeout
    #[error("{method} {url} timed out after {timeout_ms}ms")]
    Timeout {
        /// Request method
        method: &'static str,
        /// Absolute request URL
        url: String,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Request could not be built
    #[error("invalid request: {0}")]
    Request(String),

    /// Response body did not decode into the requested type
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl HttpError {
    /// Response status, if the server answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Login redirect target chosen by the error handler
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        match self {
            Self::Status {
                disposition: ErrorDisposition::RedirectToLogin { return_to },
                ..
            } => Some(return_to),
            _ => None,
        }
    }
}

/// Failure reported by a [`Transport`](crate::http::Transport)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    /// Create from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Date input errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized date input: {input:?} (expected RFC 3339 or YYYY-MM-DD)")]
pub struct DateParseError {
    /// Rejected input
    pub input: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_error_is_transparent() {
        let key: CapabilityKey = "core:logger".parse().unwrap();
        let err = ServiceError::from(RegistryError::EntryNotFound(key));
        assert_eq!(err.to_string(), "registry entry not found: core:logger");
    }

    #[test]
    fn http_error_accessors() {
        let err = HttpError::Status {
            method: "GET",
            url: "/api/me".into(),
            status: 401,
            body: json!(null),
            disposition: ErrorDisposition::RedirectToLogin {
                return_to: "/me".into(),
            },
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.redirect(), Some("/me"));
        assert_eq!(err.to_string(), "GET /api/me failed with status 401");

        let timeout = HttpError::Timeout {
            method: "POST",
            url: "/api/x".into(),
            timeout_ms: 10,
        };
        assert_eq!(timeout.status(), None);
        assert_eq!(timeout.redirect(), None);
    }
}
