//! Wiring elements: the immutable contributions modules declare.
//!
//! A schema build appends elements to a [`BlueprintRegistry`](crate::BlueprintRegistry);
//! the wiring compiler later folds the ordered list into engine artifacts.
//! Every element carries a [`SourceTag`] pointing at the declaration site.

use std::any::Any;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext, Scalar};
use async_graphql::extensions::{Extension, ExtensionFactory};
use indexmap::IndexMap;

use crate::error::Result;
use crate::module::Module;
use crate::schema::SchemaDefinitions;

/// Dynamic field resolver, shared between the wiring and the engine.
pub type Resolver = Arc<dyn for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync>;

/// Wraps a closure as a [`Resolver`].
///
/// # Example
///
/// ```ignore
/// let ping = resolver(|_ctx| FieldFuture::new(async move { Ok(Some(Value::from("pong"))) }));
/// ```
pub fn resolver<F>(f: F) -> Resolver
where
    F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Resolver that always returns the same value.
#[must_use]
pub fn constant(value: Value) -> Resolver {
    resolver(move |_ctx| {
        let value = value.clone();
        FieldFuture::new(async move { Ok(Some(value)) })
    })
}

/// Resolver returning `null` without doing any work.
#[must_use]
pub fn noop() -> Resolver {
    resolver(|_ctx| FieldFuture::Value(None))
}

/// Awaits a resolver's output regardless of whether it was computed eagerly.
pub async fn resolve_field(
    future: FieldFuture<'_>,
) -> async_graphql::Result<Option<FieldValue<'_>>> {
    match future {
        FieldFuture::Future(fut) => fut.await,
        FieldFuture::Value(value) => Ok(value),
    }
}

/// Picks the concrete object type of an interface or union value.
pub type TypeResolver = Arc<dyn Fn(&FieldValue<'_>) -> Option<String> + Send + Sync>;

/// Factory producing one data-loader instance.
pub type LoaderFactory = Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>;

type ScalarValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Custom scalar declared by a module.
#[derive(Clone)]
pub struct ScalarDefinition {
    /// Scalar name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional `@specifiedBy` URL.
    pub specified_by_url: Option<String>,
    validator: Option<ScalarValidator>,
}

impl ScalarDefinition {
    /// Creates a scalar that accepts any input value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            specified_by_url: None,
            validator: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the `@specifiedBy` URL.
    #[must_use]
    pub fn specified_by_url(mut self, url: impl Into<String>) -> Self {
        self.specified_by_url = Some(url.into());
        self
    }

    /// Sets the input validator.
    #[must_use]
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Converts the definition into an engine scalar.
    #[must_use]
    pub fn to_engine(&self) -> Scalar {
        let mut scalar = Scalar::new(self.name.as_str());
        if let Some(description) = &self.description {
            scalar = scalar.description(description.as_str());
        }
        if let Some(url) = &self.specified_by_url {
            scalar = scalar.specified_by_url(url.as_str());
        }
        if let Some(validator) = &self.validator {
            let validator = validator.clone();
            scalar = scalar.validator(move |value| validator(value));
        }
        scalar
    }
}

impl fmt::Debug for ScalarDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// The annotated field a directive wiring is applied to.
#[derive(Debug, Clone)]
pub struct DirectiveSite<'a> {
    /// Object or interface declaring the field.
    pub type_name: &'a str,
    /// Field carrying the directive.
    pub field_name: &'a str,
    /// Directive arguments as written in the schema.
    pub arguments: IndexMap<String, Value>,
}

impl DirectiveSite<'_> {
    /// Returns a directive argument by name.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }
}

/// Behavior attached to a schema directive.
pub trait DirectiveWiring: Send + Sync {
    /// Wraps the resolver of a field annotated with the directive.
    fn on_field(&self, site: &DirectiveSite<'_>, resolver: Resolver) -> Resolver;
}

impl<F> DirectiveWiring for F
where
    F: Fn(&DirectiveSite<'_>, Resolver) -> Resolver + Send + Sync,
{
    fn on_field(&self, site: &DirectiveSite<'_>, resolver: Resolver) -> Resolver {
        self(site, resolver)
    }
}

/// Request instrumentation contributed to the engine's extension chain.
///
/// Instrumentations run in declaration order; the first declared wraps
/// outermost.
pub trait Instrumentation: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Creates the engine extension factory for the assembled schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the instrumentation cannot be configured from the
    /// schema definitions.
    fn extension(&self, definitions: &SchemaDefinitions) -> Result<Arc<dyn ExtensionFactory>>;
}

/// Instrumentation wrapping a ready-made engine extension factory.
pub struct FactoryInstrumentation {
    name: String,
    factory: Arc<dyn ExtensionFactory>,
}

impl FactoryInstrumentation {
    /// Creates an instrumentation from an extension factory.
    pub fn new(name: impl Into<String>, factory: impl ExtensionFactory) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }
}

impl Instrumentation for FactoryInstrumentation {
    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self, _definitions: &SchemaDefinitions) -> Result<Arc<dyn ExtensionFactory>> {
        Ok(self.factory.clone())
    }
}

/// Adapter registering a shared factory with the engine.
pub(crate) struct EngineExtension(pub(crate) Arc<dyn ExtensionFactory>);

impl ExtensionFactory for EngineExtension {
    fn create(&self) -> Arc<dyn Extension> {
        self.0.create()
    }
}

/// Where an element was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTag {
    /// Call site captured at build time.
    Location(&'static Location<'static>),
    /// Label supplied by the caller.
    Label(String),
}

impl SourceTag {
    /// Captures the caller's location.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        Self::Location(Location::caller())
    }

    /// Creates a label tag.
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(label.into())
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Location(location) => {
                write!(f, "{}:{}:{}", location.file(), location.line(), location.column())
            }
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// One declared contribution.
#[derive(Debug, Clone)]
pub struct WiringElement {
    /// Declaration site.
    pub source: SourceTag,
    /// Payload.
    pub kind: ElementKind,
}

/// Element payloads.
#[derive(Clone)]
pub enum ElementKind {
    /// A module was installed.
    ModuleInstalled {
        /// The installed module.
        module: Arc<dyn Module>,
    },
    /// A type was opened for field bindings.
    TypeDeclared {
        /// Schema type name.
        type_name: String,
    },
    /// A resolver was bound to a field. Later bindings win.
    FieldBound {
        /// Owning type.
        type_name: String,
        /// Field name within the type.
        field_name: String,
        /// The bound resolver.
        resolver: Resolver,
    },
    /// A data loader was declared under a key.
    DataLoaderDeclared {
        /// Registry key.
        key: String,
        /// `true` builds a fresh loader per request, `false` shares one.
        per_request: bool,
        /// Builds the loader instance.
        factory: LoaderFactory,
    },
    /// A custom scalar.
    ScalarDeclared(ScalarDefinition),
    /// A schema directive and the wiring applied where it is used.
    DirectiveDeclared {
        /// Directive name without `@`.
        name: String,
        /// Wraps resolvers of annotated fields.
        wiring: Arc<dyn DirectiveWiring>,
    },
    /// An instrumentation, chained in declaration order.
    InstrumentationDeclared(Arc<dyn Instrumentation>),
    /// Picks concrete types for an interface or union.
    TypeResolverDeclared {
        /// Interface or union name.
        type_name: String,
        /// The type resolver.
        resolver: TypeResolver,
    },
}

impl ElementKind {
    /// Short variant name for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ModuleInstalled { .. } => "module",
            Self::TypeDeclared { .. } => "type",
            Self::FieldBound { .. } => "field",
            Self::DataLoaderDeclared { .. } => "data_loader",
            Self::ScalarDeclared(_) => "scalar",
            Self::DirectiveDeclared { .. } => "directive",
            Self::InstrumentationDeclared(_) => "instrumentation",
            Self::TypeResolverDeclared { .. } => "type_resolver",
        }
    }
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModuleInstalled { module } => f
                .debug_struct("ModuleInstalled")
                .field("module", &module.name())
                .finish(),
            Self::TypeDeclared { type_name } => f
                .debug_struct("TypeDeclared")
                .field("type_name", type_name)
                .finish(),
            Self::FieldBound {
                type_name,
                field_name,
                ..
            } => f
                .debug_struct("FieldBound")
                .field("type_name", type_name)
                .field("field_name", field_name)
                .finish_non_exhaustive(),
            Self::DataLoaderDeclared {
                key, per_request, ..
            } => f
                .debug_struct("DataLoaderDeclared")
                .field("key", key)
                .field("per_request", per_request)
                .finish_non_exhaustive(),
            Self::ScalarDeclared(scalar) => f.debug_tuple("ScalarDeclared").field(scalar).finish(),
            Self::DirectiveDeclared { name, .. } => f
                .debug_struct("DirectiveDeclared")
                .field("name", name)
                .finish_non_exhaustive(),
            Self::InstrumentationDeclared(instrumentation) => f
                .debug_tuple("InstrumentationDeclared")
                .field(&instrumentation.name())
                .finish(),
            Self::TypeResolverDeclared { type_name, .. } => f
                .debug_struct("TypeResolverDeclared")
                .field("type_name", type_name)
                .finish_non_exhaustive(),
        }
    }
}
