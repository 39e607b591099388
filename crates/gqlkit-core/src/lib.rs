//! # gqlkit-core
//!
//! Modular composition of GraphQL schemas on top of the `async-graphql`
//! dynamic schema engine.
//!
//! Applications describe their schema in SDL files and contribute resolvers,
//! data loaders, scalars, directives and instrumentation through modules.
//! Modules append wiring elements to a registry; the compiler folds the
//! element list into runtime wiring, an instrumentation chain and data-loader
//! blueprints; the assembler turns the merged SDL plus wiring into an engine
//! schema.
//!
//! ## Overview
//!
//! ```ignore
//! let kit = GraphKit::build(
//!     BuildOptions::builder()
//!         .schema_source(StringSchemaSource::new("type Query { ping: String }"))
//!         .build(),
//!     query_module(|q| {
//!         q.value("ping", "pong");
//!     }),
//! )?;
//! let (schema, requests) = kit.finish()?;
//! let response = schema.execute(requests.new_request("{ ping }")).await;
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! [schema]
//! directories = ["graphql"]
//! extension = "graphqls"
//!
//! [limits]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//!
//! [cache]
//! documents = 10000
//! persisted_queries = 10000
//!
//! [cost]
//! credit_limit = 1000
//! ```
//!
//! ## Modules
//!
//! - [`module`] - the module model and closure-based modules
//! - [`builder`] - the wiring builder API used inside modules
//! - [`reflect`] - capability-based modules bound to a type
//! - [`registry`] - the ordered element registry
//! - [`compiler`] - folding elements into runtime wiring
//! - [`schema`] - SDL sources, merged definitions and engine assembly
//! - [`loaders`] - data-loader blueprints and per-request registries
//! - [`kit`] - the build entry point
//! - [`config`] - configuration options
//! - [`error`] - error types

pub mod builder;
pub mod compiler;
pub mod config;
pub mod element;
pub mod error;
pub mod instance;
pub mod kit;
pub mod loaders;
pub mod module;
pub mod options;
pub mod plugin;
pub mod reflect;
pub mod registry;
pub mod schema;
pub mod value;

// Re-export main types
pub use builder::{TypeBuilder, WiringBuilder};
pub use compiler::{CompiledWiring, RuntimeWiring, WiringVisitor, compile};
pub use config::{CacheConfig, CostConfig, GqlKitConfig, LimitsConfig, SchemaConfig};
pub use element::{
    DirectiveSite, DirectiveWiring, ElementKind, FactoryInstrumentation, Instrumentation,
    Resolver, ScalarDefinition, SourceTag, TypeResolver, WiringElement,
};
pub use error::{GqlKitError, Result};
pub use instance::{DefaultInstanceResolver, InstanceResolver, ProvidedInstanceResolver, TypeKey};
pub use kit::{GraphKit, RequestFactory};
pub use loaders::{DataLoaderBlueprint, DataLoaderBlueprints, DataLoaders};
pub use module::{
    CompositeModule, GraphModule, Module, TypeBuilderModule, graph_module, mutation_module,
    query_module, type_module,
};
pub use options::{BuildOptions, BuildOptionsBuilder};
pub use plugin::BuilderPlugin;
pub use reflect::{Capability, Param, TypeModule};
pub use registry::BlueprintRegistry;
pub use schema::{
    DirectorySchemaSource, SchemaDefinitions, SchemaSource, SchemaText, StringSchemaSource,
};
