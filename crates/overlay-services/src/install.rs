//! Base registration and effective-instance accessors

use crate::error::ServiceError;
use crate::format_date::FormatDate;
use crate::http::{DetachedTransport, HttpClient, HttpConfig, Transport};
use crate::logger::{Logger, LoggerConfig};
use crate::menu::MenuConfig;
use crate::query::QueryConfig;
use crate::ui::ThemeConfig;
use overlay_registry::{well_known, CapabilityKey, Implementation, OverrideRegistry};
use serde::de::DeserializeOwned;
use std::any::Any;
use std::sync::Arc;

/// Configuration for the base services
#[derive(Debug, Clone, Default)]
pub struct ServicesConfig {
    /// Base logger settings
    pub logger: LoggerConfig,
    /// Base HTTP client settings
    pub http: HttpConfig,
    /// Base query defaults
    pub query: QueryConfig,
    /// Base theme
    pub theme: ThemeConfig,
    /// Base navigation menu
    pub menu: MenuConfig,
    /// Wire for the base HTTP client; requests fail until one is set
    pub transport: Option<Arc<dyn Transport>>,
}

impl ServicesConfig {
    /// Set the HTTP transport
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }
}

/// Register every base service
///
/// Must run before discovery and before the first read.
///
/// # Errors
/// [`ServiceError::Conversion`] if a data base fails to serialize
pub fn install_bases(registry: &OverrideRegistry, config: &ServicesConfig) -> Result<(), ServiceError> {
    registry.register_base(
        well_known::logger(),
        Implementation::service(Logger::new(config.logger.clone())),
    );

    let transport = config
        .transport
        .clone()
        .unwrap_or_else(|| Arc::new(DetachedTransport) as Arc<dyn Transport>);
    registry.register_base(
        well_known::http_client(),
        Implementation::service(HttpClient::new(config.http.clone(), transport)),
    );

    let query = well_known::query_config();
    let value = config
        .query
        .to_implementation()
        .map_err(|e| ServiceError::conversion(&query, e))?;
    registry.register_base(query, value);

    let ui = well_known::ui_provider();
    let value = config
        .theme
        .to_implementation()
        .map_err(|e| ServiceError::conversion(&ui, e))?;
    registry.register_base(ui, value);

    let menu = well_known::menu();
    let value = config
        .menu
        .to_implementation()
        .map_err(|e| ServiceError::conversion(&menu, e))?;
    registry.register_base(menu, value);

    registry.register_base(well_known::format_date(), Implementation::service(FormatDate::base()));

    tracing::debug!(count = well_known::all().len(), "base services registered");
    Ok(())
}

/// Effective implementation: merged when an extension loader exists, else the base
///
/// # Errors
/// [`ServiceError::Registry`] if no base is registered
pub async fn effective(
    registry: &OverrideRegistry,
    key: &CapabilityKey,
) -> Result<Implementation, ServiceError> {
    if registry.has_extension_loader(key) {
        Ok(registry.get(key).await?)
    } else {
        Ok(registry.get_base(key)?)
    }
}

/// Effective service of a known type
///
/// # Errors
/// - [`ServiceError::Registry`] if no base is registered
/// - [`ServiceError::Conversion`] if the value is not a `T`
pub async fn resolve_service<T: Any + Send + Sync>(
    registry: &OverrideRegistry,
    key: &CapabilityKey,
) -> Result<Arc<T>, ServiceError> {
    effective(registry, key)
        .await?
        .downcast::<T>()
        .map_err(|e| ServiceError::conversion(key, e))
}

/// Effective data decoded into a typed config
///
/// # Errors
/// - [`ServiceError::Registry`] if no base is registered
/// - [`ServiceError::Conversion`] if the merged data does not decode
pub async fn resolve_data<T: DeserializeOwned>(
    registry: &OverrideRegistry,
    key: &CapabilityKey,
) -> Result<T, ServiceError> {
    effective(registry, key)
        .await?
        .to_typed::<T>()
        .map_err(|e| ServiceError::conversion(key, e))
}

/// Effective logger
///
/// # Errors
/// See [`resolve_service`]
pub async fn logger(registry: &OverrideRegistry) -> Result<Arc<Logger>, ServiceError> {
    resolve_service(registry, &well_known::logger()).await
}

/// Effective HTTP client
///
/// # Errors
/// See [`resolve_service`]
pub async fn http_client(registry: &OverrideRegistry) -> Result<Arc<HttpClient>, ServiceError> {
    resolve_service(registry, &well_known::http_client()).await
}

/// Effective query defaults
///
/// # Errors
/// See [`resolve_data`]
pub async fn query_config(registry: &OverrideRegistry) -> Result<QueryConfig, ServiceError> {
    resolve_data(registry, &well_known::query_config()).await
}

/// Effective theme
///
/// # Errors
/// See [`resolve_data`]
pub async fn theme(registry: &OverrideRegistry) -> Result<ThemeConfig, ServiceError> {
    resolve_data(registry, &well_known::ui_provider()).await
}

/// Effective navigation menu
///
/// # Errors
/// See [`resolve_data`]
pub async fn menu(registry: &OverrideRegistry) -> Result<MenuConfig, ServiceError> {
    resolve_data(registry, &well_known::menu()).await
}

/// Effective date formatter
///
/// # Errors
/// See [`resolve_service`]
pub async fn format_date(registry: &OverrideRegistry) -> Result<Arc<FormatDate>, ServiceError> {
    resolve_service(registry, &well_known::format_date()).await
}
