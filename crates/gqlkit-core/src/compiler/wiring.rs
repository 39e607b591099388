use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::WiringVisitor;
use crate::element::{
    DirectiveWiring, ElementKind, Resolver, ScalarDefinition, SourceTag, TypeResolver,
    WiringElement,
};

/// The resolver bound to one field and where it was declared.
#[derive(Clone)]
pub struct FieldBinding {
    /// The resolver.
    pub resolver: Resolver,
    /// Declaration site.
    pub source: SourceTag,
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("source", &self.source.to_string())
            .finish_non_exhaustive()
    }
}

/// Field bindings of one type.
#[derive(Debug, Clone, Default)]
pub struct TypeWiring {
    fields: IndexMap<String, FieldBinding>,
}

impl TypeWiring {
    /// Returns the binding of `field_name`.
    #[must_use]
    pub fn field(&self, field_name: &str) -> Option<&FieldBinding> {
        self.fields.get(field_name)
    }

    /// Bound field names in first-binding order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of bound fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Bindings handed to the schema assembler.
#[derive(Clone, Default)]
pub struct RuntimeWiring {
    types: IndexMap<String, TypeWiring>,
    scalars: IndexMap<String, ScalarDefinition>,
    directives: IndexMap<String, Arc<dyn DirectiveWiring>>,
    type_resolvers: IndexMap<String, TypeResolver>,
}

impl RuntimeWiring {
    /// Returns the binding of `type_name.field_name`.
    #[must_use]
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldBinding> {
        self.types.get(type_name)?.field(field_name)
    }

    /// Returns the resolver of `type_name.field_name`.
    #[must_use]
    pub fn resolver(&self, type_name: &str, field_name: &str) -> Option<&Resolver> {
        self.field(type_name, field_name).map(|binding| &binding.resolver)
    }

    /// Returns the bindings of `type_name`.
    #[must_use]
    pub fn type_wiring(&self, type_name: &str) -> Option<&TypeWiring> {
        self.types.get(type_name)
    }

    /// Declared or bound types in first-declaration order.
    pub fn types(&self) -> impl Iterator<Item = (&str, &TypeWiring)> {
        self.types.iter().map(|(name, wiring)| (name.as_str(), wiring))
    }

    /// Returns a declared scalar.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&ScalarDefinition> {
        self.scalars.get(name)
    }

    /// Declared scalars.
    pub fn scalars(&self) -> impl Iterator<Item = &ScalarDefinition> {
        self.scalars.values()
    }

    /// Returns the wiring of a directive.
    #[must_use]
    pub fn directive(&self, name: &str) -> Option<&Arc<dyn DirectiveWiring>> {
        self.directives.get(name)
    }

    /// Returns the type resolver of an interface or union.
    #[must_use]
    pub fn type_resolver(&self, type_name: &str) -> Option<&TypeResolver> {
        self.type_resolvers.get(type_name)
    }
}

impl fmt::Debug for RuntimeWiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeWiring")
            .field("types", &self.types)
            .field("scalars", &self.scalars.keys().collect::<Vec<_>>())
            .field("directives", &self.directives.keys().collect::<Vec<_>>())
            .field(
                "type_resolvers",
                &self.type_resolvers.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builds the [`RuntimeWiring`] projection.
#[derive(Default)]
pub struct RuntimeWiringVisitor {
    wiring: RuntimeWiring,
}

impl WiringVisitor for RuntimeWiringVisitor {
    type Output = RuntimeWiring;

    fn visit(&mut self, element: &WiringElement) {
        let wiring = &mut self.wiring;
        match &element.kind {
            ElementKind::TypeDeclared { type_name } => {
                wiring.types.entry(type_name.clone()).or_default();
            }
            ElementKind::FieldBound {
                type_name,
                field_name,
                resolver,
            } => {
                let binding = FieldBinding {
                    resolver: resolver.clone(),
                    source: element.source.clone(),
                };
                let previous = wiring
                    .types
                    .entry(type_name.clone())
                    .or_default()
                    .fields
                    .insert(field_name.clone(), binding);
                if let Some(previous) = previous {
                    tracing::debug!(
                        type_name = %type_name,
                        field_name = %field_name,
                        replaced = %previous.source,
                        by = %element.source,
                        "field binding overwritten"
                    );
                }
            }
            ElementKind::ScalarDeclared(scalar) => {
                if wiring
                    .scalars
                    .insert(scalar.name.clone(), scalar.clone())
                    .is_some()
                {
                    tracing::debug!(scalar = %scalar.name, "scalar overwritten");
                }
            }
            ElementKind::DirectiveDeclared { name, wiring: directive } => {
                if wiring
                    .directives
                    .insert(name.clone(), directive.clone())
                    .is_some()
                {
                    tracing::debug!(directive = %name, "directive wiring overwritten");
                }
            }
            ElementKind::TypeResolverDeclared {
                type_name,
                resolver,
            } => {
                if wiring
                    .type_resolvers
                    .insert(type_name.clone(), resolver.clone())
                    .is_some()
                {
                    tracing::debug!(type_name = %type_name, "type resolver overwritten");
                }
            }
            ElementKind::ModuleInstalled { .. }
            | ElementKind::DataLoaderDeclared { .. }
            | ElementKind::InstrumentationDeclared(_) => {}
        }
    }

    fn finish(self) -> RuntimeWiring {
        self.wiring
    }
}
