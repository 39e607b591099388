//! Kit build options.

use std::fmt;
use std::sync::Arc;

use crate::config::GqlKitConfig;
use crate::instance::{DefaultInstanceResolver, InstanceResolver};
use crate::plugin::BuilderPlugin;
use crate::schema::{DirectorySchemaSource, SchemaSource};

/// Options of one kit build.
#[derive(Clone)]
pub struct BuildOptions {
    /// Resolves module instances.
    pub instance_resolver: Arc<dyn InstanceResolver>,
    /// Supplies schema documents.
    pub schema_source: Arc<dyn SchemaSource>,
    /// Build plugins, invoked in order.
    pub plugins: Vec<Arc<dyn BuilderPlugin>>,
    /// Kit configuration.
    pub config: GqlKitConfig,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BuildOptions {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> BuildOptionsBuilder {
        BuildOptionsBuilder::default()
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("plugins", &self.plugins.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`BuildOptions`].
///
/// Without an explicit schema source, documents are discovered in the
/// directories named by `config.schema`.
#[derive(Default)]
pub struct BuildOptionsBuilder {
    instance_resolver: Option<Arc<dyn InstanceResolver>>,
    schema_source: Option<Arc<dyn SchemaSource>>,
    plugins: Vec<Arc<dyn BuilderPlugin>>,
    config: GqlKitConfig,
}

impl BuildOptionsBuilder {
    /// Sets the instance resolver.
    #[must_use]
    pub fn instance_resolver(mut self, resolver: impl InstanceResolver + 'static) -> Self {
        self.instance_resolver = Some(Arc::new(resolver));
        self
    }

    /// Sets the schema source.
    #[must_use]
    pub fn schema_source(mut self, source: impl SchemaSource + 'static) -> Self {
        self.schema_source = Some(Arc::new(source));
        self
    }

    /// Appends a plugin.
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl BuilderPlugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: GqlKitConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the options.
    #[must_use]
    pub fn build(self) -> BuildOptions {
        let schema_source = self.schema_source.unwrap_or_else(|| {
            Arc::new(DirectorySchemaSource::from_config(&self.config.schema))
        });
        BuildOptions {
            instance_resolver: self
                .instance_resolver
                .unwrap_or_else(|| Arc::new(DefaultInstanceResolver)),
            schema_source,
            plugins: self.plugins,
            config: self.config,
        }
    }
}
