//! Testing utilities for the Overlay workspace
//!
//! Shared loaders, fixtures, and registry builders.

#![allow(missing_docs)]

use async_trait::async_trait;
use overlay_registry::{
    CapabilityKey, ExtensionLoader, Implementation, LoadError, LoadResult, OverrideRegistry,
};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Shared invocation counter
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Loader that counts invocations and returns a swappable result
///
/// The response can be changed between calls to observe re-resolution.
#[derive(Debug, Clone)]
pub struct CountingLoader {
    calls: CallCounter,
    response: Arc<Mutex<Option<Implementation>>>,
    delay: Option<Duration>,
}

impl CountingLoader {
    pub fn returning(value: Implementation) -> Self {
        Self {
            calls: CallCounter::new(),
            response: Arc::new(Mutex::new(Some(value))),
            delay: None,
        }
    }

    pub fn returning_json(value: JsonValue) -> Self {
        Self::returning(Implementation::data(value))
    }

    pub fn empty() -> Self {
        Self {
            calls: CallCounter::new(),
            response: Arc::new(Mutex::new(None)),
            delay: None,
        }
    }

    /// Sleep before answering, to widen race windows
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn counter(&self) -> CallCounter {
        self.calls.clone()
    }

    pub async fn respond_with(&self, value: Option<Implementation>) {
        *self.response.lock().await = value;
    }
}

#[async_trait]
impl ExtensionLoader for CountingLoader {
    async fn load(&self) -> LoadResult {
        self.calls.bump();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.response.lock().await.clone())
    }
}

/// Loader that always fails
#[derive(Debug, Clone)]
pub struct FailingLoader {
    calls: CallCounter,
    error: LoadError,
}

impl FailingLoader {
    pub fn new(error: LoadError) -> Self {
        Self {
            calls: CallCounter::new(),
            error,
        }
    }

    pub fn missing(location: &str) -> Self {
        Self::new(LoadError::missing(location))
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl ExtensionLoader for FailingLoader {
    async fn load(&self) -> LoadResult {
        self.calls.bump();
        Err(self.error.clone())
    }
}

pub fn key(raw: &str) -> CapabilityKey {
    raw.parse().unwrap()
}

/// Registry with a single data base registered
pub fn registry_with_base(raw_key: &str, base: JsonValue) -> OverrideRegistry {
    let registry = OverrideRegistry::new();
    registry.register_base(key(raw_key), Implementation::data(base));
    registry
}

/// Registry with a data base and a counting loader
///
/// Returns the counter so callers can assert invocation counts after the
/// loader has moved into the registry.
pub fn registry_with_extension(
    raw_key: &str,
    base: JsonValue,
    extension: JsonValue,
) -> (OverrideRegistry, CallCounter) {
    let registry = registry_with_base(raw_key, base);
    let loader = CountingLoader::returning_json(extension);
    let counter = loader.counter();
    registry.register_extension_loader(key(raw_key), loader);
    (registry, counter)
}
