//! Startup discovery
//!
//! Every provider in the manifest is tried concurrently and independently.
//! A missing or broken extension never blocks the others, and discovery
//! itself never fails. Each successful attempt registers a resolved loader so
//! the first `get` short-circuits to the discovered value.

use crate::manifest::DiscoveryManifest;
use crate::provider::ExtensionProvider;
use futures::future::join_all;
use overlay_registry::{
    CapabilityKey, Implementation, ImplementationKind, LoadError, OverrideRegistry, ResolvedLoader,
};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Result of probing one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Extension found and registered
    Registered {
        /// Shape of the discovered value
        kind: ImplementationKind,
        /// Where it came from
        location: String,
    },
    /// Nothing at the location, or nothing usable in it
    NotFound {
        /// Where the provider looked
        location: String,
    },
    /// Something was there but could not be loaded
    Failed {
        /// Loader message
        reason: String,
    },
    /// Key disabled by configuration
    Skipped,
}

impl DiscoveryOutcome {
    /// Short label for reports
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "registered",
            Self::NotFound { .. } => "not-found",
            Self::Failed { .. } => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Per-key discovery results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    outcomes: BTreeMap<CapabilityKey, DiscoveryOutcome>,
}

impl DiscoveryReport {
    /// Outcome for a key, if it was in the manifest
    #[must_use]
    pub fn outcome(&self, key: &CapabilityKey) -> Option<&DiscoveryOutcome> {
        self.outcomes.get(key)
    }

    /// Whether an extension was registered for the key
    #[must_use]
    pub fn is_registered(&self, key: &CapabilityKey) -> bool {
        matches!(self.outcome(key), Some(DiscoveryOutcome::Registered { .. }))
    }

    /// Keys with a registered extension, sorted
    #[must_use]
    pub fn registered(&self) -> Vec<&CapabilityKey> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, DiscoveryOutcome::Registered { .. }))
            .map(|(key, _)| key)
            .collect()
    }

    /// All outcomes, sorted by key
    pub fn iter(&self) -> impl Iterator<Item = (&CapabilityKey, &DiscoveryOutcome)> {
        self.outcomes.iter()
    }

    /// Number of attempted keys (including skipped)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the manifest was empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl Display for DiscoveryReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (key, outcome) in &self.outcomes {
            match outcome {
                DiscoveryOutcome::Registered { kind, location } => {
                    writeln!(f, "{key:<24} registered ({}) from {location}", kind.as_str())?;
                }
                DiscoveryOutcome::NotFound { location } => {
                    writeln!(f, "{key:<24} not found at {location}, using base")?;
                }
                DiscoveryOutcome::Failed { reason } => {
                    writeln!(f, "{key:<24} failed: {reason}, using base")?;
                }
                DiscoveryOutcome::Skipped => writeln!(f, "{key:<24} skipped (disabled)")?,
            }
        }
        Ok(())
    }
}

/// Try every provider in the manifest and register what is found
///
/// Runs after all bases are registered and before the first `get`.
pub async fn discover(registry: &OverrideRegistry, manifest: &DiscoveryManifest) -> DiscoveryReport {
    let attempts = manifest.iter().map(|provider| async move {
        let key = provider.key().clone();
        if manifest.is_disabled(&key) {
            tracing::debug!(key = %key, "extension disabled, skipping");
            return (key, DiscoveryOutcome::Skipped);
        }
        let outcome = try_provider(registry, provider.as_ref()).await;
        (key, outcome)
    });

    let outcomes: BTreeMap<_, _> = join_all(attempts).await.into_iter().collect();
    let report = DiscoveryReport { outcomes };

    tracing::info!(
        attempted = report.len(),
        registered = report.registered().len(),
        "extension discovery complete"
    );
    report
}

/// Try a single provider, registering its extension on success
///
/// Returns the discovered value, or `None` when the extension is absent or
/// broken (logged at debug level).
pub async fn load_extension(
    registry: &OverrideRegistry,
    provider: &dyn ExtensionProvider,
) -> Option<Implementation> {
    match provider.provide().await {
        Ok(Some(value)) => {
            register(registry, provider, &value);
            Some(value)
        }
        Ok(None) => {
            tracing::debug!(key = %provider.key(), location = provider.location(), "extension not found");
            None
        }
        Err(err) => {
            tracing::debug!(key = %provider.key(), error = %err, "extension load failed");
            None
        }
    }
}

async fn try_provider(registry: &OverrideRegistry, provider: &dyn ExtensionProvider) -> DiscoveryOutcome {
    match provider.provide().await {
        Ok(Some(value)) => {
            register(registry, provider, &value);
            DiscoveryOutcome::Registered {
                kind: value.kind(),
                location: provider.location().to_string(),
            }
        }
        Ok(None) => {
            tracing::debug!(key = %provider.key(), location = provider.location(), "extension not found, using base");
            DiscoveryOutcome::NotFound {
                location: provider.location().to_string(),
            }
        }
        Err(LoadError::Missing { location }) => {
            tracing::debug!(key = %provider.key(), %location, "extension not found, using base");
            DiscoveryOutcome::NotFound { location }
        }
        Err(err) => {
            tracing::debug!(key = %provider.key(), error = %err, "extension load failed, using base");
            DiscoveryOutcome::Failed {
                reason: err.to_string(),
            }
        }
    }
}

fn register(registry: &OverrideRegistry, provider: &dyn ExtensionProvider, value: &Implementation) {
    tracing::debug!(
        key = %provider.key(),
        location = provider.location(),
        kind = value.kind().as_str(),
        "extension discovered"
    );
    registry.register_extension_loader(provider.key().clone(), ResolvedLoader::new(value.clone()));
}
