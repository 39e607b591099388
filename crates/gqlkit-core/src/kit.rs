//! The kit: an engine schema builder plus a per-request factory.
//!
//! ## Build steps
//!
//! 1. Install the module(s) into a fresh [`BlueprintRegistry`] and hand the
//!    element list to every plugin's `on_build`.
//! 2. Compile the elements (wiring, instrumentation chain, loader blueprints).
//! 3. Load and merge the schema documents; plugins may transform them.
//! 4. Assemble the engine schema and register the instrumentation chain as
//!    engine extensions in declaration order; plugins may transform it.
//!
//! Any error aborts the build; no partial kit is returned.

use std::fmt;
use std::sync::Arc;

use async_graphql::Request;
use async_graphql::dynamic::{Schema, SchemaBuilder};
use async_graphql::extensions::ExtensionFactory;

use crate::compiler;
use crate::element::{EngineExtension, SourceTag, WiringElement};
use crate::error::{GqlKitError, Result};
use crate::instance::InstanceResolver;
use crate::loaders::{DataLoaderBlueprints, DataLoaders};
use crate::module::{CompositeModule, Module};
use crate::options::BuildOptions;
use crate::plugin::BuilderPlugin;
use crate::registry::BlueprintRegistry;
use crate::schema::{SchemaAssembler, SchemaDefinitions};

/// Installs `module` into a fresh registry and runs the plugins' `on_build`.
///
/// # Errors
///
/// Propagates install errors.
pub fn build_elements(
    module: Arc<dyn Module>,
    resolver: Arc<dyn InstanceResolver>,
    plugins: &[Arc<dyn BuilderPlugin>],
) -> Result<Vec<WiringElement>> {
    let mut registry = BlueprintRegistry::with_resolver(resolver);
    let source = SourceTag::label(module.name().to_string());
    registry.install(module, source)?;

    let elements = registry.into_elements();
    for plugin in plugins {
        plugin.on_build(&elements);
    }
    Ok(elements)
}

/// Creates the input of every request.
#[derive(Debug, Clone)]
pub struct RequestFactory {
    blueprints: Arc<DataLoaderBlueprints>,
}

impl RequestFactory {
    /// Creates a factory for `blueprints`.
    #[must_use]
    pub fn new(blueprints: DataLoaderBlueprints) -> Self {
        Self {
            blueprints: Arc::new(blueprints),
        }
    }

    /// A fresh loader set.
    #[must_use]
    pub fn data_loaders(&self) -> DataLoaders {
        DataLoaders::new_registry_for(&self.blueprints)
    }

    /// Creates a request for `query` carrying a fresh loader set.
    #[must_use]
    pub fn new_request(&self, query: impl Into<String>) -> Request {
        self.prepare(Request::new(query))
    }

    /// Attaches a fresh loader set to an existing request.
    #[must_use]
    pub fn prepare(&self, request: Request) -> Request {
        request.data(self.data_loaders())
    }

    /// The compiled loader blueprints.
    #[must_use]
    pub fn blueprints(&self) -> &DataLoaderBlueprints {
        &self.blueprints
    }
}

/// Engine builder plus request factory.
pub struct GraphKit {
    /// The assembled engine schema builder.
    pub schema: SchemaBuilder,
    /// Per-request input factory.
    pub requests: RequestFactory,
    /// The merged schema definitions the schema was assembled from.
    pub definitions: Arc<SchemaDefinitions>,
}

impl GraphKit {
    /// Builds a kit from one module.
    ///
    /// # Errors
    ///
    /// Returns the first install, schema source, parse or instrumentation error.
    pub fn build(options: BuildOptions, module: impl Module) -> Result<Self> {
        Self::build_from(options, Arc::new(module))
    }

    /// Builds a kit from several modules, installed in order.
    ///
    /// A single module is used directly; several are wrapped in one composite.
    ///
    /// # Errors
    ///
    /// See [`GraphKit::build`].
    pub fn build_all(options: BuildOptions, mut modules: Vec<Arc<dyn Module>>) -> Result<Self> {
        let root: Arc<dyn Module> = if modules.len() == 1 {
            modules.remove(0)
        } else {
            Arc::new(CompositeModule::new("GraphKit", modules))
        };
        Self::build_from(options, root)
    }

    fn build_from(options: BuildOptions, module: Arc<dyn Module>) -> Result<Self> {
        options.config.validate().map_err(GqlKitError::Config)?;

        let elements = build_elements(
            module,
            options.instance_resolver.clone(),
            &options.plugins,
        )?;
        let compiled = compiler::compile(&elements);

        let documents = options.schema_source.load()?;
        let mut definitions = SchemaDefinitions::parse(&documents)?;
        for plugin in &options.plugins {
            plugin.transform_definitions(&mut definitions)?;
        }

        let mut schema = SchemaAssembler::new(&definitions, &compiled.wiring)
            .with_limits(&options.config.limits)
            .assemble()?;

        for instrumentation in &compiled.instrumentations {
            let factory = instrumentation.extension(&definitions)?;
            tracing::debug!(instrumentation = instrumentation.name(), "registered instrumentation");
            schema = schema.extension(EngineExtension(factory));
        }

        for plugin in &options.plugins {
            schema = plugin.transform_schema(schema);
        }

        tracing::info!(
            elements = elements.len(),
            documents = documents.len(),
            instrumentations = compiled.instrumentations.len(),
            data_loaders = compiled.data_loaders.len(),
            "built GraphQL kit"
        );

        Ok(Self {
            schema,
            requests: RequestFactory::new(compiled.data_loaders),
            definitions: Arc::new(definitions),
        })
    }

    /// Registers an extra engine extension after the instrumentation chain.
    #[must_use]
    pub fn extension(mut self, factory: impl ExtensionFactory) -> Self {
        self.schema = self.schema.extension(factory);
        self
    }

    /// Finishes the engine schema.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::SchemaBuild`] if the engine rejects the schema.
    pub fn finish(self) -> Result<(Schema, RequestFactory)> {
        let schema = self
            .schema
            .finish()
            .map_err(|e| GqlKitError::SchemaBuild(e.to_string()))?;
        Ok((schema, self.requests))
    }
}

impl fmt::Debug for GraphKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphKit")
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::query_module;
    use crate::schema::StringSchemaSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl BuilderPlugin for Counting {
        fn on_build(&self, elements: &[WiringElement]) {
            self.0.store(elements.len(), Ordering::SeqCst);
        }
    }

    fn options(sdl: &str) -> BuildOptions {
        BuildOptions::builder()
            .schema_source(StringSchemaSource::new(sdl))
            .build()
    }

    #[test]
    fn test_build_elements_runs_plugins() {
        let seen = Arc::new(AtomicUsize::new(0));
        let plugins: Vec<Arc<dyn BuilderPlugin>> = vec![Arc::new(Counting(seen.clone()))];
        let elements = build_elements(
            Arc::new(query_module(|q| {
                q.value("ping", "pong");
            })),
            Arc::new(crate::DefaultInstanceResolver),
            &plugins,
        )
        .unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_build_and_execute() {
        let kit = GraphKit::build(
            options("type Query { ping: String }"),
            query_module(|q| {
                q.value("ping", "pong");
            }),
        )
        .unwrap();
        let (schema, requests) = kit.finish().unwrap();

        let response = schema.execute(requests.new_request("{ ping }")).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({"ping": "pong"})
        );
    }

    #[test]
    fn test_build_fails_on_invalid_config() {
        let mut options = options("type Query { ping: String }");
        options.config.limits.max_depth = 0;
        let err = GraphKit::build(options, query_module(|_| {})).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_build_fails_on_schema_error() {
        let err = GraphKit::build(options("type Query {"), query_module(|_| {})).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_PARSE_ERROR");
    }

    #[test]
    fn test_finish_reports_engine_errors() {
        let kit = GraphKit::build(
            options("type Query { user: User }"),
            query_module(|_| {}),
        )
        .unwrap();
        let err = kit.finish().unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_BUILD_FAILED");
    }
}
