//! Builder API used by modules to declare wiring elements.
//!
//! Every declaration appends exactly one element and captures the caller's
//! source location for diagnostics. Declarations are write-only; the only
//! fallible operations are installs, which may need to instantiate modules.

use std::any::Any;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dataloader::DataLoader;
use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};

use crate::element::{
    self, DirectiveWiring, ElementKind, Instrumentation, LoaderFactory, Resolver,
    ScalarDefinition, SourceTag, TypeResolver,
};
use crate::error::Result;
use crate::instance::InstanceResolver;
use crate::module::Module;
use crate::reflect::{self, TypeModule};
use crate::registry::BlueprintRegistry;

/// Declares schema-wide elements into a registry.
pub struct WiringBuilder<'r> {
    registry: &'r mut BlueprintRegistry,
}

impl<'r> WiringBuilder<'r> {
    /// Creates a builder writing into `registry`.
    pub fn new(registry: &'r mut BlueprintRegistry) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&mut self) -> &mut BlueprintRegistry {
        self.registry
    }

    /// Installs a module by value.
    ///
    /// # Errors
    ///
    /// Propagates errors from the module's install.
    #[track_caller]
    pub fn install(&mut self, module: impl Module) -> Result<&mut Self> {
        self.install_shared(Arc::new(module))
    }

    /// Installs a shared module instance. Installing the same instance twice
    /// runs it twice.
    ///
    /// # Errors
    ///
    /// Propagates errors from the module's install.
    #[track_caller]
    pub fn install_shared(&mut self, module: Arc<dyn Module>) -> Result<&mut Self> {
        self.registry.install(module, SourceTag::caller())?;
        Ok(self)
    }

    /// Installs a module obtained from the instance resolver, falling back to
    /// its `Default` constructor.
    ///
    /// # Errors
    ///
    /// Returns an instantiation error or propagates errors from the install.
    #[track_caller]
    pub fn install_type<T: Module + Default>(&mut self) -> Result<&mut Self> {
        let source = SourceTag::caller();
        let module: T = self.registry.instance()?;
        self.registry.install(Arc::new(module), source)?;
        Ok(self)
    }

    /// Installs a module that only the instance resolver can provide.
    ///
    /// # Errors
    ///
    /// Returns an instantiation error or propagates errors from the install.
    #[track_caller]
    pub fn install_injected<T: Module>(&mut self) -> Result<&mut Self> {
        let source = SourceTag::caller();
        let module: T = self.registry.inject()?;
        self.registry.install(Arc::new(module), source)?;
        Ok(self)
    }

    /// Binds the capabilities of a reflective module to `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::InvalidResolverShape`](crate::GqlKitError::InvalidResolverShape)
    /// before appending anything if a capability cannot be adapted.
    #[track_caller]
    pub fn bind_type<M: TypeModule + ?Sized>(
        &mut self,
        type_name: impl Into<String>,
        module: &M,
    ) -> Result<&mut Self> {
        let source = SourceTag::caller();
        let synthetic = reflect::derive_module(type_name.into(), module)?;
        self.registry.install(Arc::new(synthetic), source)?;
        Ok(self)
    }

    /// Binds a reflective module obtained from the instance resolver.
    ///
    /// # Errors
    ///
    /// Returns an instantiation or resolver-shape error.
    #[track_caller]
    pub fn bind_type_of<M: TypeModule + Default + Send + 'static>(
        &mut self,
        type_name: impl Into<String>,
    ) -> Result<&mut Self> {
        let module: M = self.registry.instance()?;
        self.bind_type(type_name, &module)
    }

    /// Declares `type_name` and binds its fields.
    #[track_caller]
    pub fn object<F>(&mut self, type_name: impl Into<String>, body: F) -> &mut Self
    where
        F: FnOnce(&mut TypeBuilder<'_>),
    {
        let type_name = type_name.into();
        self.registry.declare(
            SourceTag::caller(),
            ElementKind::TypeDeclared {
                type_name: type_name.clone(),
            },
        );
        body(&mut TypeBuilder::new(self.registry, type_name));
        self
    }

    /// Binds fields of `Query`.
    #[track_caller]
    pub fn query<F>(&mut self, body: F) -> &mut Self
    where
        F: FnOnce(&mut TypeBuilder<'_>),
    {
        self.object("Query", body)
    }

    /// Binds fields of `Mutation`.
    #[track_caller]
    pub fn mutation<F>(&mut self, body: F) -> &mut Self
    where
        F: FnOnce(&mut TypeBuilder<'_>),
    {
        self.object("Mutation", body)
    }

    /// Declares a type without binding fields.
    #[track_caller]
    pub fn declare_type(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.registry.declare(
            SourceTag::caller(),
            ElementKind::TypeDeclared {
                type_name: type_name.into(),
            },
        );
        self
    }

    /// Declares a loader built fresh for every request.
    #[track_caller]
    pub fn data_loader<T, F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.declare_loader(key.into(), true, erase(factory))
    }

    /// Declares a loader built once and shared by every request.
    #[track_caller]
    pub fn shared_data_loader<T, F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.declare_loader(key.into(), false, erase(factory))
    }

    /// Declares a per-request batching [`DataLoader`] spawned on tokio.
    ///
    /// Resolvers fetch it with [`DataLoaders::loader`](crate::DataLoaders::loader).
    #[track_caller]
    pub fn batch_loader<L, F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        L: Send + Sync + 'static,
        F: Fn() -> L + Send + Sync + 'static,
    {
        self.data_loader(key, move || DataLoader::new(factory(), tokio::spawn))
    }

    /// Declares a shared batching [`DataLoader`] spawned on tokio.
    #[track_caller]
    pub fn shared_batch_loader<L, F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        L: Send + Sync + 'static,
        F: Fn() -> L + Send + Sync + 'static,
    {
        self.shared_data_loader(key, move || DataLoader::new(factory(), tokio::spawn))
    }

    #[track_caller]
    fn declare_loader(&mut self, key: String, per_request: bool, factory: LoaderFactory) -> &mut Self {
        self.registry.declare(
            SourceTag::caller(),
            ElementKind::DataLoaderDeclared {
                key,
                per_request,
                factory,
            },
        );
        self
    }

    /// Declares a custom scalar.
    #[track_caller]
    pub fn scalar(&mut self, scalar: ScalarDefinition) -> &mut Self {
        self.registry
            .declare(SourceTag::caller(), ElementKind::ScalarDeclared(scalar));
        self
    }

    /// Declares the behavior of a schema directive.
    #[track_caller]
    pub fn directive(
        &mut self,
        name: impl Into<String>,
        wiring: impl DirectiveWiring + 'static,
    ) -> &mut Self {
        self.registry.declare(
            SourceTag::caller(),
            ElementKind::DirectiveDeclared {
                name: name.into(),
                wiring: Arc::new(wiring),
            },
        );
        self
    }

    /// Appends an instrumentation to the request chain.
    #[track_caller]
    pub fn instrumentation(&mut self, instrumentation: impl Instrumentation + 'static) -> &mut Self {
        self.registry.declare(
            SourceTag::caller(),
            ElementKind::InstrumentationDeclared(Arc::new(instrumentation)),
        );
        self
    }

    /// Declares how values of an interface or union pick their object type.
    #[track_caller]
    pub fn type_resolver<F>(&mut self, type_name: impl Into<String>, resolve: F) -> &mut Self
    where
        F: Fn(&FieldValue<'_>) -> Option<String> + Send + Sync + 'static,
    {
        let resolver: TypeResolver = Arc::new(resolve);
        self.registry.declare(
            SourceTag::caller(),
            ElementKind::TypeResolverDeclared {
                type_name: type_name.into(),
                resolver,
            },
        );
        self
    }

    /// Replaces the instance resolver used by later installs.
    pub fn set_instance_resolver(&mut self, resolver: Arc<dyn InstanceResolver>) -> &mut Self {
        self.registry.set_instance_resolver(resolver);
        self
    }

    /// Resolves an instance of `T` through the active instance resolver.
    ///
    /// # Errors
    ///
    /// Returns an instantiation error.
    pub fn instance<T: Default + Send + 'static>(&self) -> Result<T> {
        self.registry.instance()
    }

    /// Resolves an instance of `T` that has no zero-argument constructor.
    ///
    /// # Errors
    ///
    /// Returns an instantiation error.
    pub fn inject<T: Any + Send>(&self) -> Result<T> {
        self.registry.inject()
    }
}

fn erase<T, F>(factory: F) -> LoaderFactory
where
    T: Any + Send + Sync,
    F: Fn() -> T + Send + Sync + 'static,
{
    Arc::new(move || Arc::new(factory()) as Arc<dyn Any + Send + Sync>)
}

/// Binds fields of a single GraphQL type.
pub struct TypeBuilder<'r> {
    registry: &'r mut BlueprintRegistry,
    type_name: String,
}

impl<'r> TypeBuilder<'r> {
    /// Creates a builder for `type_name`.
    pub fn new(registry: &'r mut BlueprintRegistry, type_name: impl Into<String>) -> Self {
        Self {
            registry,
            type_name: type_name.into(),
        }
    }

    /// The bound type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Binds `field_name` to a resolver.
    #[track_caller]
    pub fn field(&mut self, field_name: impl Into<String>, resolver: Resolver) -> &mut Self {
        self.bind(field_name.into(), resolver, SourceTag::caller())
    }

    /// Binds `field_name` to a resolver closure.
    #[track_caller]
    pub fn resolve<F>(&mut self, field_name: impl Into<String>, f: F) -> &mut Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        self.bind(field_name.into(), element::resolver(f), SourceTag::caller())
    }

    /// Binds `field_name` to a constant value.
    #[track_caller]
    pub fn value(&mut self, field_name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.bind(
            field_name.into(),
            element::constant(value.into()),
            SourceTag::caller(),
        )
    }

    /// Binds `field_name` to a constant JSON document.
    #[track_caller]
    pub fn json(&mut self, field_name: impl Into<String>, json: serde_json::Value) -> &mut Self {
        self.bind(
            field_name.into(),
            element::constant(crate::value::from_json(json)),
            SourceTag::caller(),
        )
    }

    pub(crate) fn bind(&mut self, field_name: String, resolver: Resolver, source: SourceTag) -> &mut Self {
        self.registry.declare(
            source,
            ElementKind::FieldBound {
                type_name: self.type_name.clone(),
                field_name,
                resolver,
            },
        );
        self
    }
}
