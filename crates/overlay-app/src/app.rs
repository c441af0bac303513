//! Startup sequence
//!
//! ```text
//! install bases ─► build manifest ─► discover ─► App (reads allowed)
//! ```
//!
//! Every well-known key is looked up. Per key, the first source that holds an
//! extension wins:
//! 1. a provider passed to [`AppBuilder::with_provider`]
//! 2. a document under `extensions_dir` (data keys only)
//! 3. the extension linked into the binary, see [`crate::extensions`]
//!
//! The registry is only handed out by [`App`], which exists only after
//! discovery, so no read can observe a half-initialized registry.

use crate::config::AppConfig;
use crate::extensions::builtin_provider;
use overlay_discovery::{
    discover, ChainProvider, DiscoveryManifest, DiscoveryReport, DocumentFormat,
    ExtensionProvider, FileProvider, ManifestError,
};
use overlay_registry::{
    well_known, CapabilityKey, Implementation, ImplementationKind, OverrideRegistry, RegistryError,
};
use overlay_services::{
    install_bases, FormatDate, HttpClient, Logger, ServiceError, ServicesConfig, Transport,
};
use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Startup failures
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// A base service could not be registered
    #[error("failed to install base services: {0}")]
    Services(#[from] ServiceError),

    /// The discovery manifest is inconsistent
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Capabilities whose extensions may come from documents on disk
#[must_use]
pub fn file_backed_keys() -> [CapabilityKey; 3] {
    [well_known::query_config(), well_known::ui_provider(), well_known::menu()]
}

/// Conventional location of a key's extension, without file extension
///
/// `core:query-config` → `query/config`, `core:config-menu` → `config/menu`,
/// `core:logger` → `logger/logger`, `utils:formatDate` → `utils/formatDate`.
#[must_use]
pub fn extension_stem(key: &CapabilityKey) -> PathBuf {
    match key.name().split_once('-') {
        Some((group, item)) => PathBuf::from(group).join(item),
        None if key.namespace() == "core" => PathBuf::from(key.name()).join(key.name()),
        None => PathBuf::from(key.namespace()).join(key.name()),
    }
}

/// First existing document for a key under `dir`, or the `.json` candidate
#[must_use]
pub fn locate_document(dir: &Path, key: &CapabilityKey) -> PathBuf {
    let stem = dir.join(extension_stem(key));
    DocumentFormat::extensions()
        .iter()
        .map(|ext| stem.with_extension(ext))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| stem.with_extension("json"))
}

/// Builder for [`App`]
#[derive(Debug)]
pub struct AppBuilder {
    config: AppConfig,
    services: ServicesConfig,
    manifest: DiscoveryManifest,
}

impl AppBuilder {
    /// Builder with services derived from the config
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let services = config.services_config();
        Self {
            config,
            services,
            manifest: DiscoveryManifest::new(),
        }
    }

    /// Replace the base service settings
    #[must_use]
    pub fn with_services(mut self, services: ServicesConfig) -> Self {
        self.services = services;
        self
    }

    /// Wire for the base HTTP client
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.services.transport = Some(transport);
        self
    }

    /// Add a linked-in provider; it takes precedence over file discovery
    ///
    /// # Errors
    /// [`ManifestError::DuplicateKey`] for a second provider on one key
    pub fn with_provider<P: ExtensionProvider + 'static>(mut self, provider: P) -> Result<Self, ManifestError> {
        self.manifest.push(provider)?;
        Ok(self)
    }

    /// Run the startup sequence
    ///
    /// # Errors
    /// [`BootstrapError`] if bases cannot be installed
    pub async fn build(self) -> Result<App, BootstrapError> {
        let Self {
            config,
            services,
            mut manifest,
        } = self;

        let registry = Arc::new(OverrideRegistry::with_cache_capacity(config.cache_capacity));
        install_bases(&registry, &services)?;

        let file_backed = file_backed_keys();
        for key in well_known::all() {
            if manifest.contains(&key) {
                continue;
            }
            let mut chain = ChainProvider::new(key.clone());
            if file_backed.contains(&key) {
                let path = locate_document(&config.extensions_dir, &key);
                chain = chain.then(FileProvider::new(key.clone(), path));
            }
            if config.builtin_extensions {
                if let Some(builtin) = builtin_provider(&key, &services.logger) {
                    chain = chain.then(builtin);
                }
            }
            manifest.push(chain)?;
        }
        let manifest = manifest.with_disabled(config.disabled_extensions.iter().cloned());

        let discovery = discover(&registry, &manifest).await;
        tracing::info!(
            mode = config.mode.as_str(),
            entries = registry.len(),
            extended = discovery.registered().len(),
            "application ready"
        );

        Ok(App {
            config,
            registry,
            discovery,
        })
    }
}

/// One row of [`App::entries`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    /// Capability
    pub key: CapabilityKey,
    /// Shape of the base
    pub base_kind: ImplementationKind,
    /// Whether an extension loader is registered
    pub extended: bool,
    /// Discovery outcome label, if discovery saw the key
    pub discovery: Option<&'static str>,
}

/// Bootstrapped application
#[derive(Debug)]
pub struct App {
    config: AppConfig,
    registry: Arc<OverrideRegistry>,
    discovery: DiscoveryReport,
}

impl App {
    /// Bootstrap with defaults derived from the config
    ///
    /// # Errors
    /// [`BootstrapError`] if bases cannot be installed
    pub async fn bootstrap(config: AppConfig) -> Result<Self, BootstrapError> {
        AppBuilder::new(config).build().await
    }

    /// Start a customized bootstrap
    #[must_use]
    pub fn builder(config: AppConfig) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// Shared registry
    #[must_use]
    pub fn registry(&self) -> &Arc<OverrideRegistry> {
        &self.registry
    }

    /// Effective configuration
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Startup discovery results
    #[must_use]
    pub fn discovery(&self) -> &DiscoveryReport {
        &self.discovery
    }

    /// Effective (or base-only) value for a key
    ///
    /// # Errors
    /// [`RegistryError::EntryNotFound`] for an unregistered key
    pub async fn resolve(&self, key: &CapabilityKey, base_only: bool) -> Result<Implementation, RegistryError> {
        if base_only {
            self.registry.get_base(key)
        } else {
            self.registry.get(key).await
        }
    }

    /// Summary of every registered key, sorted
    #[must_use]
    pub fn entries(&self) -> Vec<EntrySummary> {
        self.registry
            .keys()
            .into_iter()
            .filter_map(|key| {
                let base = self.registry.get_base(&key).ok()?;
                Some(EntrySummary {
                    base_kind: base.kind(),
                    extended: self.registry.has_extension_loader(&key),
                    discovery: self.discovery.outcome(&key).map(|o| o.label()),
                    key,
                })
            })
            .collect()
    }
}

/// JSON rendering of a value for display
///
/// Data renders as itself; known services render their configuration.
#[must_use]
pub fn describe(value: &Implementation) -> JsonValue {
    if let Some(data) = value.as_data() {
        return data.clone();
    }
    if let Ok(logger) = value.downcast::<Logger>() {
        return json!({"service": "logger", "config": logger.config()});
    }
    if let Ok(client) = value.downcast::<HttpClient>() {
        return json!({"service": "http-client", "config": client.config()});
    }
    if let Ok(format) = value.downcast::<FormatDate>() {
        return json!({"service": "formatDate", "function": format.name()});
    }
    json!({"service": "opaque"})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> CapabilityKey {
        raw.parse().unwrap()
    }

    #[test]
    fn stems_follow_directory_convention() {
        assert_eq!(extension_stem(&key("core:query-config")), PathBuf::from("query/config"));
        assert_eq!(extension_stem(&key("core:ui-provider")), PathBuf::from("ui/provider"));
        assert_eq!(extension_stem(&key("core:http-client")), PathBuf::from("http/client"));
        assert_eq!(extension_stem(&key("core:config-menu")), PathBuf::from("config/menu"));
        assert_eq!(extension_stem(&key("core:logger")), PathBuf::from("logger/logger"));
        assert_eq!(extension_stem(&key("utils:formatDate")), PathBuf::from("utils/formatDate"));
    }

    #[test]
    fn locate_prefers_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let k = key("core:query-config");
        assert_eq!(locate_document(dir.path(), &k), dir.path().join("query/config.json"));

        std::fs::create_dir_all(dir.path().join("query")).unwrap();
        std::fs::write(dir.path().join("query/config.toml"), "").unwrap();
        assert_eq!(locate_document(dir.path(), &k), dir.path().join("query/config.toml"));
    }

    #[test]
    fn describe_known_services() {
        let format = Implementation::service(FormatDate::base());
        assert_eq!(describe(&format), json!({"service": "formatDate", "function": "base"}));

        let data = Implementation::data(json!({"retry": 3}));
        assert_eq!(describe(&data), json!({"retry": 3}));

        #[derive(Debug)]
        struct Unknown;
        assert_eq!(describe(&Implementation::service(Unknown)), json!({"service": "opaque"}));
    }
}
