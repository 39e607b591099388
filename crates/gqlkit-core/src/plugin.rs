//! Build-time plugins.

use async_graphql::dynamic::SchemaBuilder;

use crate::element::WiringElement;
use crate::error::Result;
use crate::schema::SchemaDefinitions;

/// Hooks invoked while a kit is built.
///
/// All hooks default to no-ops.
pub trait BuilderPlugin: Send + Sync {
    /// Called once with the full element list after every module installed.
    fn on_build(&self, _elements: &[WiringElement]) {}

    /// Called with the merged schema definitions before assembly.
    ///
    /// # Errors
    ///
    /// An error aborts the build.
    fn transform_definitions(&self, _definitions: &mut SchemaDefinitions) -> Result<()> {
        Ok(())
    }

    /// Called with the assembled schema builder.
    fn transform_schema(&self, schema: SchemaBuilder) -> SchemaBuilder {
        schema
    }
}
