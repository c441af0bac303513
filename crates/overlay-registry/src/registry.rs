//! The override registry
//!
//! Holds one entry per capability key: an eagerly registered base, an
//! optional lazily materialized extension, and a cached merged value.
//!
//! # Lifecycle
//!
//! ```text
//! register_base ──► register_extension_loader ──► get (first) ──► get (cached)
//!        │                                           │
//!        └── re-register: merged invalidated         └── loader runs once, result merged
//! ```
//!
//! # Concurrency
//!
//! Merged values live in an unbounded [`moka::future::Cache`] keyed by
//! `(key, generation)`. Concurrent first requests for one slot are coalesced
//! by `get_with`, so the loader runs once and every caller observes the same
//! value. Only invalidation removes a slot: it moves the entry to a fresh
//! generation, and a resolution still in flight for the old generation lands
//! in a slot nobody reads again.
//!
//! The outcome of a load, including "nothing usable", is recorded on the
//! entry, so a merged value is never the only record that the loader ran.

use crate::error::{RegistryError, RegistryResult};
use crate::key::CapabilityKey;
use crate::loader::ExtensionLoader;
use crate::merge;
use crate::value::Implementation;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use moka::future::Cache;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of keys the registry is pre-sized for
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// What the loader produced for the current extension epoch
#[derive(Debug, Clone)]
enum ExtensionState {
    /// Loader not invoked yet
    Unresolved,
    /// Loader failed or yielded nothing usable
    Absent,
    /// Loader yielded an extension
    Loaded(Implementation),
}

impl ExtensionState {
    fn loaded(&self) -> Option<&Implementation> {
        match self {
            Self::Loaded(extension) => Some(extension),
            Self::Unresolved | Self::Absent => None,
        }
    }
}

/// Per-key state
#[derive(Debug, Clone)]
struct RegistryEntry {
    base: Implementation,
    extension: ExtensionState,
    /// Changes whenever the merged value must be recomputed
    generation: u64,
    /// Changes whenever the extension state is reset
    extension_epoch: u64,
}

/// Cache slot for one generation of one key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MergedSlot {
    key: CapabilityKey,
    generation: u64,
}

/// Consistent view of an entry taken before resolution
struct EntrySnapshot {
    base: Implementation,
    extension: ExtensionState,
    generation: u64,
    extension_epoch: u64,
}

/// Registry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Keys with a registered base
    pub entries: usize,
    /// Keys with a registered extension loader
    pub loaders: usize,
    /// Approximate number of cached merged values
    pub cached: u64,
}

/// Capability override registry
///
/// Constructed explicitly and passed to collaborators; tests build isolated
/// instances. All operations except [`get`](Self::get) are synchronous.
pub struct OverrideRegistry {
    entries: DashMap<CapabilityKey, RegistryEntry>,
    loaders: DashMap<CapabilityKey, Arc<dyn ExtensionLoader>>,
    merged: Cache<MergedSlot, Implementation>,
    clock: AtomicU64,
}

impl OverrideRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create an empty registry pre-sized for `capacity` keys
    ///
    /// The capacity is a sizing hint, not a bound: a current merged value is
    /// only dropped by invalidation.
    #[must_use]
    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            loaders: DashMap::with_capacity(capacity),
            merged: Cache::builder()
                .initial_capacity(capacity)
                .support_invalidation_closures()
                .build(),
            clock: AtomicU64::new(1),
        }
    }

    /// Register or replace the base implementation for a key
    ///
    /// Replacing a base invalidates the merged value but keeps a materialized
    /// extension, so the next [`get`](Self::get) re-merges without reloading.
    /// A load that produced nothing is retried.
    pub fn register_base(&self, key: CapabilityKey, value: Implementation) {
        let generation = self.tick();

        let stale = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let previous = entry.generation;
                entry.base = value;
                entry.generation = generation;
                if matches!(entry.extension, ExtensionState::Absent) {
                    entry.extension = ExtensionState::Unresolved;
                    entry.extension_epoch = generation;
                }
                Some(previous)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(RegistryEntry {
                    base: value,
                    extension: ExtensionState::Unresolved,
                    generation,
                    extension_epoch: generation,
                });
                None
            }
        };

        match stale {
            Some(previous) => {
                tracing::debug!(key = %key, "base replaced, merged value invalidated");
                self.evict(key, previous);
            }
            None => tracing::trace!(key = %key, "base registered"),
        }
    }

    /// Register the extension loader for a key, replacing any previous one
    ///
    /// The loader is not invoked here and cached values are left alone.
    pub fn register_extension_loader<L>(&self, key: CapabilityKey, loader: L)
    where
        L: ExtensionLoader + 'static,
    {
        self.register_shared_loader(key, Arc::new(loader));
    }

    /// Register an already shared extension loader
    pub fn register_shared_loader(&self, key: CapabilityKey, loader: Arc<dyn ExtensionLoader>) {
        tracing::trace!(key = %key, ?loader, "extension loader registered");
        self.loaders.insert(key, loader);
    }

    /// Effective implementation for a key
    ///
    /// On first request (or after invalidation) invokes the extension loader
    /// if one is registered and no extension is materialized, merges the
    /// result over the base and caches it. Later requests return the cached
    /// value. A failing loader degrades to the base value.
    ///
    /// # Errors
    /// [`RegistryError::EntryNotFound`] if no base was ever registered.
    pub async fn get(&self, key: &CapabilityKey) -> RegistryResult<Implementation> {
        let snapshot = self.snapshot(key)?;
        let slot = MergedSlot {
            key: key.clone(),
            generation: snapshot.generation,
        };

        let value = self
            .merged
            .get_with(slot, self.materialize(key, snapshot))
            .await;
        Ok(value)
    }

    /// Base implementation for a key, ignoring any extension
    ///
    /// # Errors
    /// [`RegistryError::EntryNotFound`] if no base was ever registered.
    pub fn get_base(&self, key: &CapabilityKey) -> RegistryResult<Implementation> {
        self.entries
            .get(key)
            .map(|entry| entry.base.clone())
            .ok_or_else(|| RegistryError::EntryNotFound(key.clone()))
    }

    /// Whether a loader was registered for the key
    ///
    /// Independent of whether it ran or succeeded.
    #[inline]
    #[must_use]
    pub fn has_extension_loader(&self, key: &CapabilityKey) -> bool {
        self.loaders.contains_key(key)
    }

    /// Drop the materialized extension and merged value for one key
    ///
    /// The next [`get`](Self::get) re-invokes the loader. Base and loader stay.
    /// Unknown keys are ignored.
    pub fn clear_cache(&self, key: &CapabilityKey) {
        let generation = self.tick();
        let previous = self.entries.get_mut(key).map(|mut entry| {
            let previous = entry.generation;
            entry.extension = ExtensionState::Unresolved;
            entry.generation = generation;
            entry.extension_epoch = generation;
            previous
        });

        if let Some(previous) = previous {
            tracing::debug!(key = %key, "cache cleared");
            self.evict(key.clone(), previous);
        }
    }

    /// Drop every materialized extension and merged value
    pub fn clear_all_caches(&self) {
        let generation = self.tick();
        for mut entry in self.entries.iter_mut() {
            entry.extension = ExtensionState::Unresolved;
            entry.generation = generation;
            entry.extension_epoch = generation;
        }
        self.merged.invalidate_all();
        tracing::debug!(entries = self.entries.len(), "all caches cleared");
    }

    /// Whether a base is registered for the key
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<CapabilityKey> {
        let mut keys: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Number of registered keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materialized extension for a key, if one was loaded
    #[must_use]
    pub fn extension(&self, key: &CapabilityKey) -> Option<Implementation> {
        self.entries
            .get(key)
            .and_then(|entry| entry.extension.loaded().cloned())
    }

    /// Registry statistics
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            entries: self.entries.len(),
            loaders: self.loaders.len(),
            cached: self.merged.entry_count(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn snapshot(&self, key: &CapabilityKey) -> RegistryResult<EntrySnapshot> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| RegistryError::EntryNotFound(key.clone()))?;
        Ok(EntrySnapshot {
            base: entry.base.clone(),
            extension: entry.extension.clone(),
            generation: entry.generation,
            extension_epoch: entry.extension_epoch,
        })
    }

    fn loader(&self, key: &CapabilityKey) -> Option<Arc<dyn ExtensionLoader>> {
        self.loaders.get(key).map(|loader| Arc::clone(loader.value()))
    }

    async fn materialize(&self, key: &CapabilityKey, snapshot: EntrySnapshot) -> Implementation {
        let extension = match snapshot.extension {
            ExtensionState::Loaded(extension) => Some(extension),
            ExtensionState::Absent => None,
            ExtensionState::Unresolved => match self.loader(key) {
                Some(loader) => {
                    let loaded = Self::invoke(key, loader.as_ref()).await;
                    let state = match &loaded {
                        Some(extension) => ExtensionState::Loaded(extension.clone()),
                        None => ExtensionState::Absent,
                    };
                    self.store_extension(key, snapshot.extension_epoch, state);
                    loaded
                }
                None => None,
            },
        };

        let merged = merge::resolve(&snapshot.base, extension.as_ref());
        tracing::trace!(
            key = %key,
            generation = snapshot.generation,
            kind = merged.kind().as_str(),
            extended = extension.is_some(),
            "merged value computed"
        );
        merged
    }

    async fn invoke(key: &CapabilityKey, loader: &dyn ExtensionLoader) -> Option<Implementation> {
        match loader.load().await {
            Ok(Some(extension)) if extension.as_data().is_some_and(serde_json::Value::is_null) => {
                tracing::debug!(key = %key, "extension is null, using base");
                None
            }
            Ok(Some(extension)) => {
                tracing::debug!(key = %key, kind = extension.kind().as_str(), "extension loaded");
                Some(extension)
            }
            Ok(None) => {
                tracing::debug!(key = %key, "no extension value, using base");
                None
            }
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "extension load failed, using base");
                None
            }
        }
    }

    fn store_extension(&self, key: &CapabilityKey, epoch: u64, state: ExtensionState) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.extension_epoch == epoch
                && matches!(entry.extension, ExtensionState::Unresolved)
            {
                entry.extension = state;
            }
        }
    }

    fn evict(&self, key: CapabilityKey, generation: u64) {
        let result = self
            .merged
            .invalidate_entries_if(move |slot, _| slot.key == key && slot.generation == generation);
        if let Err(err) = result {
            // Stale slots are unreachable; only memory is lost.
            tracing::warn!(error = %err, "stale merged slot not invalidated");
        }
    }
}

impl Default for OverrideRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for OverrideRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideRegistry")
            .field("keys", &self.keys())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::loader::{FnLoader, ResolvedLoader};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn key(raw: &str) -> CapabilityKey {
        raw.parse().unwrap()
    }

    fn counting_loader(
        value: serde_json::Value,
    ) -> (FnLoader, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = FnLoader::new("counting", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let value = value.clone();
            async move { Ok(Some(Implementation::data(value))) }
        });
        (loader, calls)
    }

    #[tokio::test]
    async fn base_only_get_returns_base() {
        let registry = OverrideRegistry::new();
        let base = Implementation::data(json!({"retry": 3}));
        registry.register_base(key("core:query-config"), base.clone());

        let value = registry.get(&key("core:query-config")).await.unwrap();
        assert!(value.ptr_eq(&base));
    }

    #[tokio::test]
    async fn missing_key_fails() {
        let registry = OverrideRegistry::new();
        let err = registry.get(&key("nonexistent:key")).await.unwrap_err();
        assert_eq!(err, RegistryError::EntryNotFound(key("nonexistent:key")));
        assert!(registry.get_base(&key("nonexistent:key")).is_err());
    }

    #[tokio::test]
    async fn loader_without_base_still_fails() {
        let registry = OverrideRegistry::new();
        registry.register_extension_loader(
            key("core:logger"),
            ResolvedLoader::new(Implementation::data(json!(1))),
        );
        assert!(registry.has_extension_loader(&key("core:logger")));
        assert!(registry.get(&key("core:logger")).await.is_err());
    }

    #[tokio::test]
    async fn extension_is_retained_across_base_replacement() {
        let registry = OverrideRegistry::new();
        let k = key("core:query-config");
        let (loader, calls) = counting_loader(json!({"queries": {"retry": 5}}));
        registry.register_base(k.clone(), Implementation::data(json!({"queries": {"retry": 3, "gc": 1}})));
        registry.register_extension_loader(k.clone(), loader);

        let first = registry.get(&k).await.unwrap();
        assert_eq!(first.as_data(), Some(&json!({"queries": {"retry": 5, "gc": 1}})));

        registry.register_base(k.clone(), Implementation::data(json!({"queries": {"retry": 3, "gc": 2}})));
        let second = registry.get(&k).await.unwrap();
        assert_eq!(second.as_data(), Some(&json!({"queries": {"retry": 5, "gc": 2}})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.extension(&k).is_some());
    }

    #[tokio::test]
    async fn failed_load_is_not_materialized() {
        let registry = OverrideRegistry::new();
        let k = key("core:logger");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register_base(k.clone(), Implementation::data(json!("base")));
        registry.register_extension_loader(
            k.clone(),
            FnLoader::new("failing", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(LoadError::failed("boom")) }
            }),
        );

        assert_eq!(registry.get(&k).await.unwrap().as_data(), Some(&json!("base")));
        assert_eq!(registry.get(&k).await.unwrap().as_data(), Some(&json!("base")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.extension(&k).is_none());

        registry.register_base(k.clone(), Implementation::data(json!("base-2")));
        assert_eq!(registry.get(&k).await.unwrap().as_data(), Some(&json!("base-2")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_all_caches_reloads_every_key() {
        let registry = OverrideRegistry::new();
        let (loader_a, calls_a) = counting_loader(json!(1));
        let (loader_b, calls_b) = counting_loader(json!(2));
        registry.register_base(key("test:a"), Implementation::data(json!(0)));
        registry.register_base(key("test:b"), Implementation::data(json!(0)));
        registry.register_extension_loader(key("test:a"), loader_a);
        registry.register_extension_loader(key("test:b"), loader_b);

        registry.get(&key("test:a")).await.unwrap();
        registry.get(&key("test:b")).await.unwrap();
        registry.clear_all_caches();
        registry.get(&key("test:a")).await.unwrap();
        registry.get(&key("test:b")).await.unwrap();

        assert_eq!(calls_a.load(Ordering::SeqCst), 2);
        assert_eq!(calls_b.load(Ordering::SeqCst), 2);
        assert!(registry.has_extension_loader(&key("test:a")));
        assert!(registry.get_base(&key("test:a")).is_ok());
    }

    #[test]
    fn clear_cache_on_unknown_key_is_noop() {
        let registry = OverrideRegistry::new();
        registry.clear_cache(&key("ghost:key"));
        assert!(registry.is_empty());
    }

    #[test]
    fn keys_are_sorted() {
        let registry = OverrideRegistry::new();
        registry.register_base(key("utils:formatDate"), Implementation::data(json!(0)));
        registry.register_base(key("core:logger"), Implementation::data(json!(0)));
        registry.register_base(key("core:http-client"), Implementation::data(json!(0)));

        let keys: Vec<_> = registry.keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["core:http-client", "core:logger", "utils:formatDate"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn stats_count_entries_and_loaders() {
        let registry = OverrideRegistry::new();
        registry.register_base(key("core:logger"), Implementation::data(json!(0)));
        registry.register_extension_loader(
            key("core:logger"),
            ResolvedLoader::new(Implementation::data(json!(1))),
        );
        let stats = registry.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.loaders, 1);
    }

    #[tokio::test]
    async fn more_keys_than_capacity_load_once_each() {
        let registry = OverrideRegistry::with_cache_capacity(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let keys: Vec<_> = (0..64).map(|i| key(&format!("test:k{i}"))).collect();
        for k in &keys {
            let counter = Arc::clone(&calls);
            registry.register_base(k.clone(), Implementation::data(json!({"n": 0})));
            registry.register_extension_loader(
                k.clone(),
                FnLoader::new("counting", move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(Some(Implementation::data(json!({"n": 1})))) }
                }),
            );
        }

        for _ in 0..3 {
            for k in &keys {
                let value = registry.get(k).await.unwrap();
                assert_eq!(value.as_data(), Some(&json!({"n": 1})));
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 64);
    }

    #[tokio::test]
    async fn failed_load_runs_once_without_cache_headroom() {
        let registry = OverrideRegistry::with_cache_capacity(0);
        let k = key("core:logger");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register_base(k.clone(), Implementation::data(json!("base")));
        registry.register_extension_loader(
            k.clone(),
            FnLoader::new("failing", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(LoadError::failed("boom")) }
            }),
        );

        for _ in 0..5 {
            assert_eq!(registry.get(&k).await.unwrap().as_data(), Some(&json!("base")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn null_extension_keeps_base() {
        let registry = OverrideRegistry::new();
        let k = key("core:query-config");
        let base = Implementation::data(json!({"retry": 3}));
        registry.register_base(k.clone(), base.clone());
        registry.register_extension_loader(k.clone(), ResolvedLoader::new(Implementation::data(json!(null))));

        assert!(registry.get(&k).await.unwrap().ptr_eq(&base));
        assert!(registry.extension(&k).is_none());
    }
}
