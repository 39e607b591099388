//! Data-loader lifecycle.
//!
//! Compilation turns `DataLoaderDeclared` elements into
//! [`DataLoaderBlueprints`]. Every request then gets its own [`DataLoaders`]
//! set: per-request loaders are built fresh, shared loaders are the single
//! instance built at compile time.
//!
//! ## Usage
//!
//! ```ignore
//! let loader = ctx.data::<DataLoaders>()?
//!     .loader::<UserLoader>("users")
//!     .ok_or("users loader missing")?;
//! let user = loader.load_one(id).await?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_graphql::dataloader::DataLoader;
use indexmap::IndexMap;

use crate::element::LoaderFactory;

type ErasedLoader = Arc<dyn Any + Send + Sync>;

/// How a loader is produced for a request.
#[derive(Clone)]
pub enum DataLoaderBlueprint {
    /// Built fresh for every request.
    PerRequest {
        /// Registry key.
        key: String,
        /// Loader factory.
        factory: LoaderFactory,
    },
    /// One instance reused by every request.
    Shared {
        /// Registry key.
        key: String,
        /// The shared loader.
        loader: ErasedLoader,
    },
}

impl DataLoaderBlueprint {
    /// Registry key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::PerRequest { key, .. } | Self::Shared { key, .. } => key,
        }
    }

    /// Returns `true` for per-request loaders.
    #[must_use]
    pub fn is_per_request(&self) -> bool {
        matches!(self, Self::PerRequest { .. })
    }

    fn instantiate(&self) -> ErasedLoader {
        match self {
            Self::PerRequest { factory, .. } => factory(),
            Self::Shared { loader, .. } => loader.clone(),
        }
    }
}

impl fmt::Debug for DataLoaderBlueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = if self.is_per_request() {
            "per_request"
        } else {
            "shared"
        };
        f.debug_struct("DataLoaderBlueprint")
            .field("key", &self.key())
            .field("scope", &scope)
            .finish()
    }
}

/// Compiled loader blueprints, one per key.
#[derive(Debug, Clone, Default)]
pub struct DataLoaderBlueprints {
    blueprints: IndexMap<String, DataLoaderBlueprint>,
}

impl DataLoaderBlueprints {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a blueprint, replacing any previous one with the same key.
    ///
    /// Returns the replaced blueprint.
    pub fn insert(&mut self, blueprint: DataLoaderBlueprint) -> Option<DataLoaderBlueprint> {
        let key = blueprint.key().to_string();
        self.blueprints.insert(key, blueprint)
    }

    /// Looks up a blueprint by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DataLoaderBlueprint> {
        self.blueprints.get(key)
    }

    /// Number of blueprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    /// Returns `true` if there are no blueprints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    /// Iterates blueprints in first-declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &DataLoaderBlueprint> {
        self.blueprints.values()
    }
}

/// The loader set of one request.
///
/// Cloning is cheap; clones share the same loaders.
#[derive(Clone, Default)]
pub struct DataLoaders {
    loaders: Arc<HashMap<String, ErasedLoader>>,
}

impl DataLoaders {
    /// Builds the loader set for a new request.
    #[must_use]
    pub fn new_registry_for(blueprints: &DataLoaderBlueprints) -> Self {
        let loaders = blueprints
            .iter()
            .map(|blueprint| (blueprint.key().to_string(), blueprint.instantiate()))
            .collect::<HashMap<_, _>>();
        tracing::trace!(loaders = loaders.len(), "created request data loaders");
        Self {
            loaders: Arc::new(loaders),
        }
    }

    /// Returns the loader registered under `key` if it has type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.loaders.get(key).cloned()?.downcast::<T>().ok()
    }

    /// Returns the batching loader registered under `key`.
    #[must_use]
    pub fn loader<L: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<DataLoader<L>>> {
        self.get::<DataLoader<L>>(key)
    }

    /// Returns `true` if a loader is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.loaders.contains_key(key)
    }

    /// Number of loaders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Returns `true` if there are no loaders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl fmt::Debug for DataLoaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.loaders.keys().collect();
        keys.sort();
        f.debug_struct("DataLoaders").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_factory(counter: Arc<AtomicUsize>) -> LoaderFactory {
        Arc::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(n) as ErasedLoader
        })
    }

    #[test]
    fn test_per_request_loaders_are_fresh() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut blueprints = DataLoaderBlueprints::new();
        blueprints.insert(DataLoaderBlueprint::PerRequest {
            key: "counter".into(),
            factory: counting_factory(built.clone()),
        });

        let first = DataLoaders::new_registry_for(&blueprints);
        let second = DataLoaders::new_registry_for(&blueprints);

        assert_eq!(*first.get::<usize>("counter").unwrap(), 0);
        assert_eq!(*second.get::<usize>("counter").unwrap(), 1);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shared_loader_is_reused() {
        let shared: ErasedLoader = Arc::new(String::from("countries"));
        let mut blueprints = DataLoaderBlueprints::new();
        blueprints.insert(DataLoaderBlueprint::Shared {
            key: "countries".into(),
            loader: shared,
        });

        let first = DataLoaders::new_registry_for(&blueprints);
        let second = DataLoaders::new_registry_for(&blueprints);
        let a = first.get::<String>("countries").unwrap();
        let b = second.get::<String>("countries").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let mut blueprints = DataLoaderBlueprints::new();
        blueprints.insert(DataLoaderBlueprint::Shared {
            key: "k".into(),
            loader: Arc::new(1u8),
        });
        let replaced = blueprints.insert(DataLoaderBlueprint::Shared {
            key: "k".into(),
            loader: Arc::new(2u8),
        });
        assert!(replaced.is_some());
        assert_eq!(blueprints.len(), 1);

        let loaders = DataLoaders::new_registry_for(&blueprints);
        assert_eq!(*loaders.get::<u8>("k").unwrap(), 2);
    }

    #[test]
    fn test_wrong_type_is_none() {
        let mut blueprints = DataLoaderBlueprints::new();
        blueprints.insert(DataLoaderBlueprint::Shared {
            key: "k".into(),
            loader: Arc::new(1u8),
        });
        let loaders = DataLoaders::new_registry_for(&blueprints);
        assert!(loaders.contains("k"));
        assert!(loaders.get::<u16>("k").is_none());
        assert!(loaders.get::<u8>("missing").is_none());
    }
}
