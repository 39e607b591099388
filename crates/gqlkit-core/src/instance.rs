//! Instance resolution for module types.
//!
//! Modules installed by type (rather than by value) are obtained through an
//! [`InstanceResolver`]. The default strategy default-constructs the type;
//! host applications substitute their own strategy to plug in a dependency
//! injection container.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{GqlKitError, Result};

/// Identifies a requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key of `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the requested type.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name of the requested type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Zero-argument constructor of a type-erased instance.
pub type Constructor = fn() -> Box<dyn Any + Send>;

/// Produces instances of requested types.
pub trait InstanceResolver: Send + Sync {
    /// Resolves an instance of the type identified by `key`.
    ///
    /// `fallback` is the type's zero-argument constructor when it has one.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::Instantiation`] if no instance can be produced.
    fn resolve(&self, key: TypeKey, fallback: Option<Constructor>) -> Result<Box<dyn Any + Send>>;
}

/// Default strategy: requires a zero-argument constructor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInstanceResolver;

impl InstanceResolver for DefaultInstanceResolver {
    fn resolve(&self, key: TypeKey, fallback: Option<Constructor>) -> Result<Box<dyn Any + Send>> {
        match fallback {
            Some(constructor) => Ok(constructor()),
            None => Err(GqlKitError::Instantiation {
                type_name: key.name().to_string(),
                reason: "no zero-argument constructor available".to_string(),
            }),
        }
    }
}

type Provider = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// Resolver backed by explicitly registered providers.
///
/// Types without a provider fall back to their zero-argument constructor.
///
/// # Example
///
/// ```ignore
/// let resolver = ProvidedInstanceResolver::new()
///     .provide(|| UserModule::new(pool.clone()));
/// ```
#[derive(Clone, Default)]
pub struct ProvidedInstanceResolver {
    providers: HashMap<TypeId, Provider>,
}

impl ProvidedInstanceResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider for `T`, replacing any previous one.
    #[must_use]
    pub fn provide<T, F>(mut self, provider: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.providers
            .insert(TypeId::of::<T>(), Arc::new(move || Box::new(provider())));
        self
    }

    /// Returns `true` if a provider is registered for `T`.
    #[must_use]
    pub fn provides<T: Any>(&self) -> bool {
        self.providers.contains_key(&TypeId::of::<T>())
    }
}

impl InstanceResolver for ProvidedInstanceResolver {
    fn resolve(&self, key: TypeKey, fallback: Option<Constructor>) -> Result<Box<dyn Any + Send>> {
        if let Some(provider) = self.providers.get(&key.id()) {
            tracing::trace!(type_name = key.name(), "resolving instance from provider");
            return Ok(provider());
        }
        DefaultInstanceResolver.resolve(key, fallback)
    }
}

impl fmt::Debug for ProvidedInstanceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvidedInstanceResolver")
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// Zero-argument constructor of `T`.
pub fn construct<T: Default + Send + 'static>() -> Box<dyn Any + Send> {
    Box::new(T::default())
}

/// Recovers a concrete instance from a resolved box.
///
/// # Errors
///
/// Returns [`GqlKitError::Instantiation`] if the resolver produced a value of
/// a different type.
pub fn downcast<T: Any>(key: TypeKey, instance: Box<dyn Any + Send>) -> Result<T> {
    instance
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| GqlKitError::Instantiation {
            type_name: key.name().to_string(),
            reason: "resolver produced an instance of another type".to_string(),
        })
}
