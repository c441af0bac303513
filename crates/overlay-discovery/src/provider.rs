//! Extension providers
//!
//! A provider knows one capability key, where its extension would come
//! from, and how to pull the usable instance out of whatever it finds there.
//!
//! - [`StaticProvider`]: implementation linked into the binary
//! - [`FileProvider`]: JSON / YAML / TOML document on disk
//! - [`ChainProvider`]: first of several sources that holds an extension

use async_trait::async_trait;
use overlay_registry::{CapabilityKey, Implementation, LoadError, LoadResult};
use serde_json::Value as JsonValue;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of one capability's extension
#[async_trait]
pub trait ExtensionProvider: Send + Sync + Debug {
    /// Capability this provider extends
    fn key(&self) -> &CapabilityKey;

    /// Human-readable origin, used in logs and reports
    fn location(&self) -> &str;

    /// Load and extract the extension
    ///
    /// `Ok(None)` when the location exists but holds nothing usable.
    async fn provide(&self) -> LoadResult;
}

/// Provider for an implementation compiled into the binary
#[derive(Debug, Clone)]
pub struct StaticProvider {
    key: CapabilityKey,
    location: String,
    value: Implementation,
}

impl StaticProvider {
    /// Create provider for a linked implementation
    pub fn new(key: CapabilityKey, location: impl Into<String>, value: Implementation) -> Self {
        Self {
            key,
            location: location.into(),
            value,
        }
    }
}

#[async_trait]
impl ExtensionProvider for StaticProvider {
    fn key(&self) -> &CapabilityKey {
        &self.key
    }

    fn location(&self) -> &str {
        &self.location
    }

    async fn provide(&self) -> LoadResult {
        Ok(Some(self.value.clone()))
    }
}

/// Supported extension document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
}

impl DocumentFormat {
    /// Detect format from file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str())? {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Supported file extensions (without dot)
    #[must_use]
    pub fn extensions() -> &'static [&'static str] {
        &["json", "yaml", "yml", "toml"]
    }

    /// Parse a document into JSON
    ///
    /// # Errors
    /// Returns the decoder's message on malformed input
    pub fn parse(self, raw: &str) -> Result<JsonValue, String> {
        match self {
            Self::Json => serde_json::from_str(raw).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(raw).map_err(|e| e.to_string()),
        }
    }
}

/// Provider reading a data extension from a document on disk
///
/// An optional JSON pointer selects the usable part of the document, so one
/// file can carry several capabilities.
#[derive(Debug, Clone)]
pub struct FileProvider {
    key: CapabilityKey,
    path: PathBuf,
    pointer: Option<String>,
    location: String,
}

impl FileProvider {
    /// Create provider for a document path
    pub fn new(key: CapabilityKey, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.display().to_string();
        Self {
            key,
            path,
            pointer: None,
            location,
        }
    }

    /// Select a sub-value by JSON pointer (e.g. `/theme`)
    #[must_use]
    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        let pointer = pointer.into();
        self.location = format!("{}#{}", self.path.display(), pointer);
        self.pointer = Some(pointer);
        self
    }

    /// Document path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<String, LoadError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(raw),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(LoadError::missing(self.location.as_str()))
            }
            Err(err) => Err(LoadError::invalid(self.location.as_str(), err)),
        }
    }
}

#[async_trait]
impl ExtensionProvider for FileProvider {
    fn key(&self) -> &CapabilityKey {
        &self.key
    }

    fn location(&self) -> &str {
        &self.location
    }

    async fn provide(&self) -> LoadResult {
        let format = DocumentFormat::from_path(&self.path).ok_or_else(|| {
            LoadError::invalid(
                self.location.as_str(),
                format!("unsupported extension, expected one of {:?}", DocumentFormat::extensions()),
            )
        })?;

        let raw = self.read().await?;
        let document = format
            .parse(&raw)
            .map_err(|reason| LoadError::invalid(self.location.as_str(), reason))?;

        let selected = match &self.pointer {
            Some(pointer) => document.pointer(pointer).cloned(),
            None => Some(document),
        };
        Ok(selected.map(Implementation::data))
    }
}

/// Provider trying several sources for one key, in order
///
/// The first source that yields a value wins. A source that is missing or
/// empty passes to the next one; any other failure stops the chain, so a
/// broken document is reported instead of silently shadowed. An empty chain
/// tries the key and finds nothing.
#[derive(Debug, Clone)]
pub struct ChainProvider {
    key: CapabilityKey,
    sources: Vec<Arc<dyn ExtensionProvider>>,
    location: String,
}

impl ChainProvider {
    /// Chain with no sources yet
    pub fn new(key: CapabilityKey) -> Self {
        let location = format!("{key} (nothing linked)");
        Self {
            key,
            sources: Vec::new(),
            location,
        }
    }

    /// Append a source, tried after the existing ones
    ///
    /// Sources for another key are ignored with a warning.
    #[must_use]
    pub fn then<P: ExtensionProvider + 'static>(mut self, source: P) -> Self {
        if source.key() != &self.key {
            tracing::warn!(
                key = %self.key,
                source_key = %source.key(),
                "source for another key left out of chain"
            );
            return self;
        }
        self.sources.push(Arc::new(source));
        self.location = self
            .sources
            .iter()
            .map(|source| source.location())
            .collect::<Vec<_>>()
            .join(", then ");
        self
    }

    /// Number of sources
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the chain has no sources
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl ExtensionProvider for ChainProvider {
    fn key(&self) -> &CapabilityKey {
        &self.key
    }

    fn location(&self) -> &str {
        &self.location
    }

    async fn provide(&self) -> LoadResult {
        for source in &self.sources {
            match source.provide().await {
                Ok(Some(value)) => {
                    tracing::trace!(key = %self.key, location = source.location(), "chain source matched");
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(err) if err.is_missing() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}
