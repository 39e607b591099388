//! # gqlkit-ext
//!
//! Request guards and build plugins for `gqlkit-core` kits.
//!
//! - [`DocumentCache`] - engine extension serving parsed and validated
//!   documents from a bounded single-flight cache
//! - [`PersistedQueryExtension`] - automatic persisted queries keyed by the
//!   SHA-256 of the query text
//! - [`CostInstrumentation`] - per-request credit limit priced by `@cost`
//! - [`SchemaPrintingPlugin`] - logs every field binding with its
//!   declaration site
//!
//! ## Wiring
//!
//! ```ignore
//! let documents = DocumentCache::from_config(&config.cache);
//! let persisted = PersistedQueryExtension::new(
//!     PersistedQueryCache::from_config(&config.cache),
//!     documents.clone(),
//! );
//! let module = graph_module("Guards", move |b| {
//!     b.instrumentation(FactoryInstrumentation::new("persisted", persisted.clone()));
//!     b.instrumentation(FactoryInstrumentation::new("documents", documents.clone()));
//!     b.instrumentation(CostInstrumentation::new(1000));
//!     Ok(())
//! });
//! ```

pub mod cache;
pub mod cost;
pub mod document;
pub mod persisted;
pub mod printing;

pub use cache::QueryCache;
pub use cost::{Charge, CostExtensionFactory, CostInstrumentation, CostState, FieldCosts};
pub use document::{DocumentCache, DocumentEntry, validation_key};
pub use persisted::{PersistedQuery, PersistedQueryCache, PersistedQueryExtension, query_hash};
pub use printing::SchemaPrintingPlugin;
