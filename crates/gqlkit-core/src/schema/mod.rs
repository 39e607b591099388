//! Schema documents and engine schema assembly.
//!
//! - [`source`] - where SDL documents come from
//! - [`definitions`] - parsed and merged type definitions
//! - [`assembler`] - conversion into an engine `SchemaBuilder`

pub mod assembler;
pub mod definitions;
pub mod source;

pub use assembler::{SchemaAssembler, property_resolver, type_ref};
pub use definitions::{SchemaDefinitions, named_type};
pub use source::{DirectorySchemaSource, SchemaSource, SchemaText, StringSchemaSource};
