//! HTTP client (`core:http-client`)
//!
//! The client owns request shaping and error policy; the wire is supplied by
//! the host through [`Transport`]. Behavior is layered in a fixed order:
//!
//! ```text
//! config headers ─► token (Authorization: Bearer) ─► request hooks ─► transport
//!                                                                        │
//!                                   error handler ◄── non-2xx / network ─┘
//! ```

use crate::error::{HttpError, TransportError};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Default API prefix
pub const DEFAULT_BASE_URL: &str = "/api";

/// Default request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    /// Prefix for relative request paths
    pub base_url: String,
    /// Request timeout; `0` disables it
    pub timeout_ms: u64,
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// Send cookies with cross-origin requests
    pub with_credentials: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            headers: BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            with_credentials: true,
        }
    }
}

impl HttpConfig {
    /// Replace the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Timeout as a duration, `None` when disabled
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Resolve a request path against the base URL
    ///
    /// Absolute `http(s)://` URLs pass through untouched.
    #[must_use]
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Uppercase method name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Outgoing request, after all hooks have run
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Method
    pub method: Method,
    /// Path as passed by the caller
    pub path: String,
    /// Absolute URL
    pub url: String,
    /// Headers
    pub headers: BTreeMap<String, String>,
    /// JSON body
    pub body: Option<JsonValue>,
    /// Send cookies with cross-origin requests
    pub with_credentials: bool,
}

impl Request {
    /// Header value, matched case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any case-insensitive match
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }
}

/// Response as returned by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Headers
    pub headers: BTreeMap<String, String>,
    /// JSON body (`null` when empty)
    pub body: JsonValue,
}

impl Response {
    /// Response with no headers
    #[must_use]
    pub fn new(status: u16, body: JsonValue) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
        }
    }

    /// 2xx status
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body
    ///
    /// # Errors
    /// [`HttpError::Decode`] when the body does not match `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        T::deserialize(&self.body).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

/// Wire implementation supplied by the host
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Send a request and wait for its response
    async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

/// Transport used until the host provides one; every request fails
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedTransport;

#[async_trait]
impl Transport for DetachedTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        Err(TransportError::new(format!(
            "no transport configured for {} {}",
            request.method.as_str(),
            request.url
        )))
    }
}

/// Source of the bearer token
pub trait TokenSource: Send + Sync + Debug {
    /// Current token, if signed in
    fn token(&self) -> Option<String>;

    /// Forget the token
    fn clear(&self);
}

/// In-memory token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    /// Store pre-filled with a token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Replace the token
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }
}

impl TokenSource for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn clear(&self) {
        self.token.write().take();
    }
}

/// Pre-request hook, run in registration order after the token is applied
pub trait RequestHook: Send + Sync {
    /// Adjust the request
    fn before_send(&self, request: &mut Request);
}

impl<F> RequestHook for F
where
    F: Fn(&mut Request) + Send + Sync,
{
    fn before_send(&self, request: &mut Request) {
        self(request);
    }
}

/// What to do after a failed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Hand the error to the caller
    Propagate,
    /// Session is gone; send the user to the login page
    RedirectToLogin {
        /// Where to come back to after signing in
        return_to: String,
    },
}

/// Error policy for failed requests
pub trait ErrorHandler: Send + Sync {
    /// Non-2xx response
    fn on_status(
        &self,
        request: &Request,
        response: &Response,
        tokens: &dyn TokenSource,
    ) -> ErrorDisposition;

    /// No response (network failure or timeout)
    fn on_transport(&self, request: &Request, error: &HttpError) {
        tracing::error!(method = request.method.as_str(), url = %request.url, error = %error, "network error, no response received");
    }
}

/// Status classification with logout on 401
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn on_status(
        &self,
        request: &Request,
        response: &Response,
        tokens: &dyn TokenSource,
    ) -> ErrorDisposition {
        let url = request.url.as_str();
        match response.status {
            401 => {
                tracing::warn!(url, "unauthorized request");
                tokens.clear();
                return ErrorDisposition::RedirectToLogin {
                    return_to: request.path.clone(),
                };
            }
            403 => tracing::warn!(url, "forbidden request"),
            404 => tracing::warn!(url, "resource not found"),
            500..=599 => tracing::error!(url, status = response.status, body = %response.body, "server error"),
            status => tracing::error!(url, status, body = %response.body, "http error"),
        }
        ErrorDisposition::Propagate
    }
}

/// HTTP client with layered behavior
pub struct HttpClient {
    config: HttpConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
    request_hooks: Vec<Arc<dyn RequestHook>>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl HttpClient {
    /// Client with an in-memory token store and the default error handler
    #[must_use]
    pub fn new(config: HttpConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            tokens: Arc::new(MemoryTokenStore::default()),
            request_hooks: Vec::new(),
            error_handler: Arc::new(DefaultErrorHandler),
        }
    }

    /// Replace the token source
    #[must_use]
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Append a pre-request hook
    #[must_use]
    pub fn with_request_hook<H: RequestHook + 'static>(mut self, hook: H) -> Self {
        self.request_hooks.push(Arc::new(hook));
        self
    }

    /// Replace the error handler
    #[must_use]
    pub fn with_error_handler<H: ErrorHandler + 'static>(mut self, handler: H) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Client configuration
    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Token source in use
    #[must_use]
    pub fn tokens(&self) -> &Arc<dyn TokenSource> {
        &self.tokens
    }

    /// Build a request with headers, token and hooks applied
    #[must_use]
    pub fn prepare(&self, method: Method, path: &str, body: Option<JsonValue>) -> Request {
        let mut request = Request {
            method,
            path: path.to_string(),
            url: self.config.resolve_url(path),
            headers: self.config.headers.clone(),
            body,
            with_credentials: self.config.with_credentials,
        };
        if let Some(token) = self.tokens.token() {
            request.set_header("Authorization", format!("Bearer {token}"));
        }
        for hook in &self.request_hooks {
            hook.before_send(&mut request);
        }
        request
    }

    /// Send a request
    ///
    /// # Errors
    /// - [`HttpError::Status`] for non-2xx responses, carrying the handler's disposition
    /// - [`HttpError::Network`] / [`HttpError::Timeout`] when no response arrives
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<Response, HttpError> {
        let request = self.prepare(method, path, body);
        tracing::debug!(method = method.as_str(), url = %request.url, "http request");

        let sent = match self.config.timeout() {
            Some(limit) => tokio::time::timeout(limit, self.transport.send(&request)).await,
            None => Ok(self.transport.send(&request).await),
        };

        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let err = HttpError::Network {
                    method: method.as_str(),
                    url: request.url.clone(),
                    reason: err.0,
                };
                self.error_handler.on_transport(&request, &err);
                return Err(err);
            }
            Err(_elapsed) => {
                let err = HttpError::Timeout {
                    method: method.as_str(),
                    url: request.url.clone(),
                    timeout_ms: self.config.timeout_ms,
                };
                self.error_handler.on_transport(&request, &err);
                return Err(err);
            }
        };

        tracing::debug!(status = response.status, url = %request.url, "http response");
        if response.is_success() {
            return Ok(response);
        }

        let disposition = self
            .error_handler
            .on_status(&request, &response, self.tokens.as_ref());
        Err(HttpError::Status {
            method: method.as_str(),
            url: request.url,
            status: response.status,
            body: response.body,
            disposition,
        })
    }

    /// GET
    ///
    /// # Errors
    /// See [`send`](Self::send)
    pub async fn get(&self, path: &str) -> Result<Response, HttpError> {
        self.send(Method::Get, path, None).await
    }

    /// DELETE
    ///
    /// # Errors
    /// See [`send`](Self::send)
    pub async fn delete(&self, path: &str) -> Result<Response, HttpError> {
        self.send(Method::Delete, path, None).await
    }

    /// POST with a JSON body
    ///
    /// # Errors
    /// [`HttpError::Request`] if the body does not serialize, else see [`send`](Self::send)
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, HttpError> {
        self.send(Method::Post, path, Some(encode(body)?)).await
    }

    /// PUT with a JSON body
    ///
    /// # Errors
    /// [`HttpError::Request`] if the body does not serialize, else see [`send`](Self::send)
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, HttpError> {
        self.send(Method::Put, path, Some(encode(body)?)).await
    }

    /// PATCH with a JSON body
    ///
    /// # Errors
    /// [`HttpError::Request`] if the body does not serialize, else see [`send`](Self::send)
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, HttpError> {
        self.send(Method::Patch, path, Some(encode(body)?)).await
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<JsonValue, HttpError> {
    serde_json::to_value(body).map_err(|e| HttpError::Request(e.to_string()))
}

impl Debug for HttpClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("request_hooks", &self.request_hooks.len())
            .finish_non_exhaustive()
    }
}
