//! Extension loaders
//!
//! A loader is the asynchronous factory registered per key. The registry
//! invokes it at most once per materialization, on the first `get` that
//! needs it.

use crate::error::LoadError;
use crate::value::Implementation;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::{self, Debug, Formatter};
use std::future::Future;

/// Outcome of one loader invocation
///
/// `Ok(None)` means "no usable value here, use the base". It is the normal state
/// for a capability nobody has overridden.
pub type LoadResult = Result<Option<Implementation>, LoadError>;

/// Asynchronous factory for a capability's extension
#[async_trait]
pub trait ExtensionLoader: Send + Sync + Debug {
    /// Produce the extension value
    async fn load(&self) -> LoadResult;
}

/// Loader around a value that has already been discovered
///
/// Never fails and never suspends for long. Registering one makes the next
/// `get` short-circuit to the value.
#[derive(Debug, Clone)]
pub struct ResolvedLoader {
    value: Implementation,
}

impl ResolvedLoader {
    /// Wrap a resolved extension value
    #[inline]
    #[must_use]
    pub fn new(value: Implementation) -> Self {
        Self { value }
    }

    /// The wrapped value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Implementation {
        &self.value
    }
}

#[async_trait]
impl ExtensionLoader for ResolvedLoader {
    async fn load(&self) -> LoadResult {
        Ok(Some(self.value.clone()))
    }
}

/// Loader backed by an async closure
pub struct FnLoader {
    label: String,
    factory: Box<dyn Fn() -> BoxFuture<'static, LoadResult> + Send + Sync>,
}

impl FnLoader {
    /// Wrap a closure producing a load future
    ///
    /// `label` only shows up in debug output and logs.
    pub fn new<F, Fut>(label: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult> + Send + 'static,
    {
        Self {
            label: label.into(),
            factory: Box::new(move || Box::pin(factory())),
        }
    }
}

impl Debug for FnLoader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLoader")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ExtensionLoader for FnLoader {
    async fn load(&self) -> LoadResult {
        (self.factory)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolved_loader_yields_value() {
        let value = Implementation::data(json!({"retry": 5}));
        let loader = ResolvedLoader::new(value.clone());
        let loaded = loader.load().await.unwrap().unwrap();
        assert!(loaded.ptr_eq(&value));
    }

    #[tokio::test]
    async fn fn_loader_runs_closure() {
        let loader = FnLoader::new("inline", || async { Ok(Some(Implementation::data(json!(7)))) });
        let loaded = loader.load().await.unwrap().unwrap();
        assert_eq!(loaded.as_data(), Some(&json!(7)));
    }

    #[tokio::test]
    async fn fn_loader_propagates_failure() {
        let loader = FnLoader::new("broken", || async {
            Err(LoadError::missing("extensions/logger"))
        });
        assert!(loader.load().await.unwrap_err().is_missing());
    }

    #[test]
    fn fn_loader_debug_shows_label() {
        let loader = FnLoader::new("lookup", || async { Ok(None) });
        assert!(format!("{loader:?}").contains("lookup"));
    }
}
