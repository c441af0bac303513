//! Discovery manifest
//!
//! The statically known list of extension providers tried at startup.

use crate::provider::ExtensionProvider;
use overlay_registry::CapabilityKey;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Ordered list of providers, at most one per capability key
#[derive(Debug, Clone, Default)]
pub struct DiscoveryManifest {
    providers: Vec<Arc<dyn ExtensionProvider>>,
    disabled: BTreeSet<CapabilityKey>,
}

impl DiscoveryManifest {
    /// Create empty manifest
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider
    ///
    /// # Errors
    /// [`ManifestError::DuplicateKey`] if a provider for the key is already listed
    pub fn push<P: ExtensionProvider + 'static>(&mut self, provider: P) -> Result<(), ManifestError> {
        self.push_shared(Arc::new(provider))
    }

    /// Add an already shared provider
    ///
    /// # Errors
    /// [`ManifestError::DuplicateKey`] if a provider for the key is already listed
    pub fn push_shared(&mut self, provider: Arc<dyn ExtensionProvider>) -> Result<(), ManifestError> {
        if self.contains(provider.key()) {
            return Err(ManifestError::DuplicateKey(provider.key().clone()));
        }
        self.providers.push(provider);
        Ok(())
    }

    /// Builder form of [`push`](Self::push)
    ///
    /// # Errors
    /// [`ManifestError::DuplicateKey`] if a provider for the key is already listed
    pub fn with_provider<P: ExtensionProvider + 'static>(
        mut self,
        provider: P,
    ) -> Result<Self, ManifestError> {
        self.push(provider)?;
        Ok(self)
    }

    /// Skip a key during discovery
    pub fn disable(&mut self, key: CapabilityKey) {
        self.disabled.insert(key);
    }

    /// Builder form of [`disable`](Self::disable)
    #[must_use]
    pub fn with_disabled(mut self, keys: impl IntoIterator<Item = CapabilityKey>) -> Self {
        self.disabled.extend(keys);
        self
    }

    /// Whether a provider for the key is listed
    #[must_use]
    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.providers.iter().any(|p| p.key() == key)
    }

    /// Whether the key is disabled
    #[inline]
    #[must_use]
    pub fn is_disabled(&self, key: &CapabilityKey) -> bool {
        self.disabled.contains(key)
    }

    /// Providers in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ExtensionProvider>> {
        self.providers.iter()
    }

    /// Number of providers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the manifest is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Manifest construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// Two providers for one key
    #[error("extension provider already listed for key: {0}")]
    DuplicateKey(CapabilityKey),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticProvider;
    use overlay_registry::{well_known, Implementation};
    use serde_json::json;

    fn provider(key: CapabilityKey) -> StaticProvider {
        StaticProvider::new(key, "builtin", Implementation::data(json!(1)))
    }

    #[test]
    fn manifest_keeps_order() {
        let manifest = DiscoveryManifest::new()
            .with_provider(provider(well_known::logger()))
            .unwrap()
            .with_provider(provider(well_known::format_date()))
            .unwrap();

        let keys: Vec<_> = manifest.iter().map(|p| p.key().to_string()).collect();
        assert_eq!(keys, vec!["core:logger", "utils:formatDate"]);
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn manifest_rejects_duplicate_key() {
        let mut manifest = DiscoveryManifest::new();
        manifest.push(provider(well_known::logger())).unwrap();
        let err = manifest.push(provider(well_known::logger())).unwrap_err();
        assert_eq!(err, ManifestError::DuplicateKey(well_known::logger()));
    }

    #[test]
    fn manifest_disabled_keys() {
        let manifest = DiscoveryManifest::new().with_disabled([well_known::http_client()]);
        assert!(manifest.is_disabled(&well_known::http_client()));
        assert!(!manifest.is_disabled(&well_known::logger()));
        assert!(manifest.is_empty());
    }
}
