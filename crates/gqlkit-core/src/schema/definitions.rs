//! Parsed and merged schema definitions.

use async_graphql_parser::types::{
    BaseType, ConstDirective, FieldDefinition, SchemaDefinition, TypeDefinition, TypeKind,
    TypeSystemDefinition,
};
use async_graphql_parser::{Positioned, parse_schema};
use indexmap::IndexMap;

use super::source::SchemaText;
use crate::error::{GqlKitError, Result};

/// Type definitions of all schema documents, with extensions merged.
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinitions {
    types: IndexMap<String, TypeDefinition>,
    schema: Option<SchemaDefinition>,
    directives: Vec<String>,
}

impl SchemaDefinitions {
    /// Parses and merges `documents` in order.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::SchemaParse`] for invalid SDL and
    /// [`GqlKitError::SchemaBuild`] for duplicate types or extensions of
    /// undefined types.
    pub fn parse(documents: &[SchemaText]) -> Result<Self> {
        let mut definitions = Self::default();
        let mut extensions = Vec::new();

        for document in documents {
            let parsed = parse_schema(&document.text).map_err(|e| GqlKitError::SchemaParse {
                origin: document.origin.clone(),
                message: e.to_string(),
            })?;

            for definition in parsed.definitions {
                match definition {
                    TypeSystemDefinition::Type(ty) if ty.node.extend => extensions.push(ty.node),
                    TypeSystemDefinition::Type(ty) => definitions.insert_type(ty.node)?,
                    TypeSystemDefinition::Schema(schema) => definitions.merge_schema(schema.node),
                    TypeSystemDefinition::Directive(directive) => {
                        definitions.directives.push(directive.node.name.node.to_string());
                    }
                }
            }
        }

        for extension in extensions {
            definitions.extend_type(extension)?;
        }

        tracing::debug!(
            documents = documents.len(),
            types = definitions.types.len(),
            "parsed schema definitions"
        );
        Ok(definitions)
    }

    /// Parses a single inline document.
    ///
    /// # Errors
    ///
    /// See [`SchemaDefinitions::parse`].
    pub fn from_sdl(sdl: &str) -> Result<Self> {
        Self::parse(&[SchemaText::new("<inline>", sdl)])
    }

    /// Adds a new type definition.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::SchemaBuild`] if the type is already defined.
    pub fn insert_type(&mut self, definition: TypeDefinition) -> Result<()> {
        let name = definition.name.node.to_string();
        if self.types.contains_key(&name) {
            return Err(GqlKitError::SchemaBuild(format!("type `{name}` is defined more than once")));
        }
        self.types.insert(name, definition);
        Ok(())
    }

    /// Removes a type definition.
    pub fn remove_type(&mut self, name: &str) -> Option<TypeDefinition> {
        self.types.shift_remove(name)
    }

    fn merge_schema(&mut self, schema: SchemaDefinition) {
        match &mut self.schema {
            Some(existing) => {
                existing.query = schema.query.or(existing.query.take());
                existing.mutation = schema.mutation.or(existing.mutation.take());
                existing.subscription = schema.subscription.or(existing.subscription.take());
            }
            None => self.schema = Some(schema),
        }
    }

    fn extend_type(&mut self, extension: TypeDefinition) -> Result<()> {
        let name = extension.name.node.to_string();
        let Some(base) = self.types.get_mut(&name) else {
            return Err(GqlKitError::SchemaBuild(format!(
                "cannot extend undefined type `{name}`"
            )));
        };

        base.directives.extend(extension.directives);
        match (&mut base.kind, extension.kind) {
            (TypeKind::Object(base), TypeKind::Object(ext)) => {
                base.implements.extend(ext.implements);
                base.fields.extend(ext.fields);
            }
            (TypeKind::Interface(base), TypeKind::Interface(ext)) => {
                base.implements.extend(ext.implements);
                base.fields.extend(ext.fields);
            }
            (TypeKind::Union(base), TypeKind::Union(ext)) => base.members.extend(ext.members),
            (TypeKind::Enum(base), TypeKind::Enum(ext)) => base.values.extend(ext.values),
            (TypeKind::InputObject(base), TypeKind::InputObject(ext)) => {
                base.fields.extend(ext.fields);
            }
            (TypeKind::Scalar, TypeKind::Scalar) => {}
            _ => {
                return Err(GqlKitError::SchemaBuild(format!(
                    "extension of `{name}` does not match its kind"
                )));
            }
        }
        tracing::trace!(type_name = %name, "merged type extension");
        Ok(())
    }

    /// Type definitions in first-definition order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    /// Returns a type definition.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    /// Returns a type definition for modification.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut TypeDefinition> {
        self.types.get_mut(name)
    }

    /// Names of declared directives.
    #[must_use]
    pub fn directive_names(&self) -> &[String] {
        &self.directives
    }

    /// Name of the query root.
    #[must_use]
    pub fn query_type(&self) -> &str {
        self.schema
            .as_ref()
            .and_then(|s| s.query.as_ref())
            .map_or("Query", |name| name.node.as_str())
    }

    /// Name of the mutation root, if the schema has one.
    #[must_use]
    pub fn mutation_type(&self) -> Option<&str> {
        self.root_type(|s| s.mutation.as_ref(), "Mutation")
    }

    /// Name of the subscription root, if the schema has one.
    #[must_use]
    pub fn subscription_type(&self) -> Option<&str> {
        self.root_type(|s| s.subscription.as_ref(), "Subscription")
    }

    fn root_type<'a>(
        &'a self,
        select: impl Fn(&'a SchemaDefinition) -> Option<&'a Positioned<async_graphql::Name>>,
        default: &'static str,
    ) -> Option<&'a str> {
        match self.schema.as_ref().and_then(select) {
            Some(name) => Some(name.node.as_str()),
            None => self.types.contains_key(default).then_some(default),
        }
    }

    /// Returns a field of an object or interface type.
    #[must_use]
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDefinition> {
        fields_of(self.types.get(type_name)?)
            .iter()
            .map(|field| &field.node)
            .find(|field| field.name.node.as_str() == field_name)
    }

    /// Returns a directive applied to a field.
    #[must_use]
    pub fn field_directive(
        &self,
        type_name: &str,
        field_name: &str,
        directive: &str,
    ) -> Option<&ConstDirective> {
        self.field(type_name, field_name)?
            .directives
            .iter()
            .map(|d| &d.node)
            .find(|d| d.name.node.as_str() == directive)
    }

    /// Every `(type, field, directive)` where `directive` is applied to a field.
    #[must_use]
    pub fn fields_with_directive(&self, directive: &str) -> Vec<(&str, &str, &ConstDirective)> {
        let mut found = Vec::new();
        for definition in self.types.values() {
            for field in fields_of(definition) {
                for applied in &field.node.directives {
                    if applied.node.name.node.as_str() == directive {
                        found.push((
                            definition.name.node.as_str(),
                            field.node.name.node.as_str(),
                            &applied.node,
                        ));
                    }
                }
            }
        }
        found
    }

    /// Returns `true` for interfaces and unions.
    #[must_use]
    pub fn is_abstract(&self, type_name: &str) -> bool {
        matches!(
            self.types.get(type_name).map(|t| &t.kind),
            Some(TypeKind::Interface(_) | TypeKind::Union(_))
        )
    }
}

fn fields_of(definition: &TypeDefinition) -> &[Positioned<FieldDefinition>] {
    match &definition.kind {
        TypeKind::Object(object) => &object.fields,
        TypeKind::Interface(interface) => &interface.fields,
        _ => &[],
    }
}

/// Innermost named type of a field type.
#[must_use]
pub fn named_type(ty: &async_graphql_parser::types::Type) -> &str {
    match &ty.base {
        BaseType::Named(name) => name.as_str(),
        BaseType::List(inner) => named_type(inner),
    }
}
