//! The build-scoped blueprint registry.
//!
//! A registry is created once per schema build, receives every element the
//! installed modules declare (in order), and is consumed by the wiring
//! compiler. It is passed explicitly through the install call graph.

use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::element::{ElementKind, SourceTag, WiringElement};
use crate::error::Result;
use crate::instance::{self, DefaultInstanceResolver, InstanceResolver, TypeKey};
use crate::module::Module;

/// Identity of an installed module instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    address: usize,
    name: String,
}

impl ModuleKey {
    /// Returns the identity of a module instance.
    #[must_use]
    pub fn of(module: &Arc<dyn Module>) -> Self {
        Self {
            address: Arc::as_ptr(module) as *const () as usize,
            name: module.name().to_string(),
        }
    }

    /// Name of the module.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered, append-only collection of wiring elements.
pub struct BlueprintRegistry {
    elements: Vec<WiringElement>,
    resolver: Arc<dyn InstanceResolver>,
    installations: IndexMap<ModuleKey, Vec<Range<usize>>>,
}

impl Default for BlueprintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlueprintRegistry {
    /// Creates an empty registry using the default instance resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(DefaultInstanceResolver))
    }

    /// Creates an empty registry using `resolver` for module instances.
    #[must_use]
    pub fn with_resolver(resolver: Arc<dyn InstanceResolver>) -> Self {
        Self {
            elements: Vec::new(),
            resolver,
            installations: IndexMap::new(),
        }
    }

    /// Installs a module.
    ///
    /// Appends a `ModuleInstalled` element, then runs the module's own
    /// install against this registry. Installing the same instance again
    /// re-runs it; the registry never deduplicates.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by the module.
    pub fn install(&mut self, module: Arc<dyn Module>, source: SourceTag) -> Result<()> {
        let key = ModuleKey::of(&module);
        let start = self.elements.len();
        tracing::trace!(module = key.name(), source = %source, "installing module");

        self.declare(
            source,
            ElementKind::ModuleInstalled {
                module: module.clone(),
            },
        );
        module.install(self)?;

        let end = self.elements.len();
        self.installations.entry(key).or_default().push(start..end);
        Ok(())
    }

    /// Appends one element.
    pub fn declare(&mut self, source: SourceTag, kind: ElementKind) {
        tracing::trace!(element = kind.label(), source = %source, "declared element");
        self.elements.push(WiringElement { source, kind });
    }

    /// The declared elements, in declaration order.
    #[must_use]
    pub fn elements(&self) -> &[WiringElement] {
        &self.elements
    }

    /// Consumes the registry, returning its elements.
    #[must_use]
    pub fn into_elements(self) -> Vec<WiringElement> {
        self.elements
    }

    /// Element ranges produced by each install of `module`.
    #[must_use]
    pub fn installations_of(&self, module: &Arc<dyn Module>) -> &[Range<usize>] {
        self.installations
            .get(&ModuleKey::of(module))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All recorded installs, in first-install order.
    pub fn installations(&self) -> impl Iterator<Item = (&ModuleKey, &[Range<usize>])> {
        self.installations
            .iter()
            .map(|(key, ranges)| (key, ranges.as_slice()))
    }

    /// The active instance resolver.
    #[must_use]
    pub fn instance_resolver(&self) -> &Arc<dyn InstanceResolver> {
        &self.resolver
    }

    /// Replaces the instance resolver for subsequent installs.
    pub fn set_instance_resolver(&mut self, resolver: Arc<dyn InstanceResolver>) {
        self.resolver = resolver;
    }

    /// Resolves an instance of `T`, default-constructing when the resolver
    /// has nothing better.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::Instantiation`](crate::GqlKitError::Instantiation)
    /// if the resolver fails.
    pub fn instance<T: Default + Send + 'static>(&self) -> Result<T> {
        let key = TypeKey::of::<T>();
        let boxed = self.resolver.resolve(key, Some(instance::construct::<T>))?;
        instance::downcast(key, boxed)
    }

    /// Resolves an instance of `T` that has no zero-argument constructor.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::Instantiation`](crate::GqlKitError::Instantiation)
    /// if the resolver cannot provide `T`.
    pub fn inject<T: Any + Send>(&self) -> Result<T> {
        let key = TypeKey::of::<T>();
        let boxed = self.resolver.resolve(key, None)?;
        instance::downcast(key, boxed)
    }
}

impl fmt::Debug for BlueprintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueprintRegistry")
            .field("elements", &self.elements.len())
            .field("modules", &self.installations.len())
            .finish()
    }
}
