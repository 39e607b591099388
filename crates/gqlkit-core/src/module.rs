//! The module composition model.
//!
//! A [`Module`] contributes wiring elements to a registry. Composite modules
//! are built from closures over the builder API:
//!
//! - [`GraphModule`] - free-form contributions through a [`WiringBuilder`]
//! - [`TypeBuilderModule`] - field bindings for one GraphQL type
//! - [`CompositeModule`] - a list of nested modules installed in order
//!
//! Reflective modules implement [`TypeModule`](crate::reflect::TypeModule)
//! and are bound to a type with [`WiringBuilder::bind_type`].

use std::sync::Arc;

use crate::builder::{TypeBuilder, WiringBuilder};
use crate::element::{ElementKind, SourceTag};
use crate::error::Result;
use crate::registry::BlueprintRegistry;

/// A unit of contribution to a schema build.
pub trait Module: Send + Sync + 'static {
    /// Appends this module's elements to `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested module cannot be instantiated or has an
    /// invalid shape.
    fn install(&self, registry: &mut BlueprintRegistry) -> Result<()>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

type GraphBody = Box<dyn Fn(&mut WiringBuilder<'_>) -> Result<()> + Send + Sync>;

/// Module defined by a closure over the wiring builder.
///
/// # Example
///
/// ```ignore
/// let module = GraphModule::new("PingModule", |b| {
///     b.query(|q| {
///         q.value("ping", Value::from("pong"));
///     });
///     Ok(())
/// });
/// ```
pub struct GraphModule {
    name: String,
    body: GraphBody,
}

impl GraphModule {
    /// Creates a module named `name`.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut WiringBuilder<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }
}

impl Module for GraphModule {
    fn install(&self, registry: &mut BlueprintRegistry) -> Result<()> {
        let mut builder = WiringBuilder::new(registry);
        (self.body)(&mut builder)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

type TypeBody = Box<dyn Fn(&mut TypeBuilder<'_>) + Send + Sync>;

/// Module binding fields of a single GraphQL type.
pub struct TypeBuilderModule {
    name: String,
    type_name: String,
    source: SourceTag,
    body: TypeBody,
}

impl TypeBuilderModule {
    /// Creates a module for `type_name`.
    #[track_caller]
    pub fn new<F>(type_name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut TypeBuilder<'_>) + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        Self {
            name: format!("TypeBuilderModule({type_name})"),
            type_name,
            source: SourceTag::caller(),
            body: Box::new(body),
        }
    }

    /// Overrides the diagnostic name and source tag.
    #[must_use]
    pub fn labeled(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.source = SourceTag::label(name.clone());
        self.name = name;
        self
    }

    /// The bound type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl Module for TypeBuilderModule {
    fn install(&self, registry: &mut BlueprintRegistry) -> Result<()> {
        registry.declare(
            self.source.clone(),
            ElementKind::TypeDeclared {
                type_name: self.type_name.clone(),
            },
        );
        let mut builder = TypeBuilder::new(registry, self.type_name.clone());
        (self.body)(&mut builder);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Module installing a fixed list of modules in order.
pub struct CompositeModule {
    name: String,
    modules: Vec<Arc<dyn Module>>,
}

impl CompositeModule {
    /// Creates a composite of `modules`.
    pub fn new(name: impl Into<String>, modules: Vec<Arc<dyn Module>>) -> Self {
        Self {
            name: name.into(),
            modules,
        }
    }

    /// Number of nested modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if there are no nested modules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Module for CompositeModule {
    fn install(&self, registry: &mut BlueprintRegistry) -> Result<()> {
        for module in &self.modules {
            let source = SourceTag::label(format!("{}/{}", self.name, module.name()));
            registry.install(module.clone(), source)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Creates a [`GraphModule`].
pub fn graph_module<F>(name: impl Into<String>, body: F) -> GraphModule
where
    F: Fn(&mut WiringBuilder<'_>) -> Result<()> + Send + Sync + 'static,
{
    GraphModule::new(name, body)
}

/// Creates a module binding fields of `Query`.
#[track_caller]
pub fn query_module<F>(body: F) -> TypeBuilderModule
where
    F: Fn(&mut TypeBuilder<'_>) + Send + Sync + 'static,
{
    TypeBuilderModule::new("Query", body)
}

/// Creates a module binding fields of `Mutation`.
#[track_caller]
pub fn mutation_module<F>(body: F) -> TypeBuilderModule
where
    F: Fn(&mut TypeBuilder<'_>) + Send + Sync + 'static,
{
    TypeBuilderModule::new("Mutation", body)
}

/// Creates a module binding fields of `type_name`.
#[track_caller]
pub fn type_module<F>(type_name: impl Into<String>, body: F) -> TypeBuilderModule
where
    F: Fn(&mut TypeBuilder<'_>) + Send + Sync + 'static,
{
    TypeBuilderModule::new(type_name, body)
}
