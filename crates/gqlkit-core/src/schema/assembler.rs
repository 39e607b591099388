//! Assembles the engine schema from definitions and compiled wiring.
//!
//! ## Resolution rules
//!
//! - Bound fields use the resolver from the [`RuntimeWiring`].
//! - Unbound object fields read the property of the same name from the
//!   parent object value.
//! - Field directives with a registered wiring wrap the resolver, in the
//!   order they appear on the field.
//! - Fields whose named type is an interface or union with a registered type
//!   resolver tag their values, or each item of a list, with the concrete type.

use std::collections::HashSet;

use async_graphql::Value;
use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
    InterfaceField, Object, Scalar, Schema, SchemaBuilder, TypeRef, Union,
};
use async_graphql_parser::types::{
    BaseType, FieldDefinition, InputValueDefinition, Type, TypeDefinition, TypeKind,
};
use indexmap::IndexMap;

use super::definitions::{SchemaDefinitions, named_type};
use crate::compiler::RuntimeWiring;
use crate::config::LimitsConfig;
use crate::element::{self, DirectiveSite, Resolver, TypeResolver};
use crate::error::Result;
use crate::value;

const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Builds an engine [`SchemaBuilder`].
pub struct SchemaAssembler<'a> {
    definitions: &'a SchemaDefinitions,
    wiring: &'a RuntimeWiring,
    limits: Option<&'a LimitsConfig>,
}

impl<'a> SchemaAssembler<'a> {
    /// Creates an assembler.
    #[must_use]
    pub fn new(definitions: &'a SchemaDefinitions, wiring: &'a RuntimeWiring) -> Self {
        Self {
            definitions,
            wiring,
            limits: None,
        }
    }

    /// Applies query limits to the assembled schema.
    #[must_use]
    pub fn with_limits(mut self, limits: &'a LimitsConfig) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Assembles the schema builder.
    ///
    /// # Errors
    ///
    /// Currently infallible for parsed definitions; engine-level validation
    /// happens in [`SchemaBuilder::finish`].
    pub fn assemble(&self) -> Result<SchemaBuilder> {
        let query = self.definitions.query_type();
        let mutation = self.definitions.mutation_type();
        let subscription = self.definitions.subscription_type();
        if let Some(subscription) = subscription {
            tracing::warn!(type_name = %subscription, "subscription root is not supported, skipping");
        }

        let mut builder = Schema::build(query, mutation, None);
        let mut scalars = HashSet::new();

        for definition in self.definitions.types() {
            let name = definition.name.node.as_str();
            if Some(name) == subscription {
                continue;
            }
            builder = match &definition.kind {
                TypeKind::Scalar => {
                    if BUILTIN_SCALARS.contains(&name) {
                        continue;
                    }
                    scalars.insert(name.to_string());
                    builder.register(self.scalar(definition))
                }
                TypeKind::Object(object) => {
                    let mut engine = Object::new(name);
                    if let Some(description) = &definition.description {
                        engine = engine.description(description.node.as_str());
                    }
                    for interface in &object.implements {
                        engine = engine.implement(interface.node.as_str());
                    }
                    for field in &object.fields {
                        engine = engine.field(self.field(name, &field.node));
                    }
                    builder.register(engine)
                }
                TypeKind::Interface(interface) => {
                    let mut engine = Interface::new(name);
                    if let Some(description) = &definition.description {
                        engine = engine.description(description.node.as_str());
                    }
                    for parent in &interface.implements {
                        engine = engine.implement(parent.node.as_str());
                    }
                    for field in &interface.fields {
                        engine = engine.field(interface_field(&field.node));
                    }
                    builder.register(engine)
                }
                TypeKind::Union(union) => {
                    let mut engine = Union::new(name);
                    if let Some(description) = &definition.description {
                        engine = engine.description(description.node.as_str());
                    }
                    for member in &union.members {
                        engine = engine.possible_type(member.node.as_str());
                    }
                    builder.register(engine)
                }
                TypeKind::Enum(enumeration) => {
                    let mut engine = Enum::new(name);
                    if let Some(description) = &definition.description {
                        engine = engine.description(description.node.as_str());
                    }
                    for item in &enumeration.values {
                        let mut engine_item = EnumItem::new(item.node.value.node.as_str());
                        if let Some(description) = &item.node.description {
                            engine_item = engine_item.description(description.node.as_str());
                        }
                        engine = engine.item(engine_item);
                    }
                    builder.register(engine)
                }
                TypeKind::InputObject(input) => {
                    let mut engine = InputObject::new(name);
                    if let Some(description) = &definition.description {
                        engine = engine.description(description.node.as_str());
                    }
                    for field in &input.fields {
                        engine = engine.field(input_value(&field.node));
                    }
                    builder.register(engine)
                }
            };
        }

        // Scalars declared in code but absent from the SDL.
        for scalar in self.wiring.scalars() {
            if !scalars.contains(&scalar.name) && self.definitions.get(&scalar.name).is_none() {
                builder = builder.register(scalar.to_engine());
            }
        }

        for (type_name, type_wiring) in self.wiring.types() {
            if self.definitions.get(type_name).is_none() {
                tracing::warn!(type_name = %type_name, "wiring references a type missing from the schema");
                continue;
            }
            for field_name in type_wiring.field_names() {
                if self.definitions.field(type_name, field_name).is_none() {
                    tracing::warn!(
                        type_name = %type_name,
                        field_name = %field_name,
                        "wiring references a field missing from the schema"
                    );
                }
            }
        }

        if let Some(limits) = self.limits {
            builder = builder
                .limit_depth(limits.max_depth)
                .limit_complexity(limits.max_complexity);
            if !limits.introspection {
                builder = builder.disable_introspection();
            }
        }

        tracing::debug!(query = %query, mutation = ?mutation, "assembled schema");
        Ok(builder)
    }

    fn scalar(&self, definition: &TypeDefinition) -> Scalar {
        let name = definition.name.node.as_str();
        if let Some(scalar) = self.wiring.scalar(name) {
            return scalar.to_engine();
        }
        let mut scalar = Scalar::new(name);
        if let Some(description) = &definition.description {
            scalar = scalar.description(description.node.as_str());
        }
        scalar
    }

    fn field(&self, type_name: &str, definition: &FieldDefinition) -> Field {
        let field_name = definition.name.node.as_str();
        let mut resolver = match self.wiring.resolver(type_name, field_name) {
            Some(resolver) => resolver.clone(),
            None => property_resolver(field_name.to_string()),
        };

        for directive in &definition.directives {
            let directive = &directive.node;
            let Some(wiring) = self.wiring.directive(directive.name.node.as_str()) else {
                continue;
            };
            let site = DirectiveSite {
                type_name,
                field_name,
                arguments: directive
                    .arguments
                    .iter()
                    .map(|(name, value)| (name.node.to_string(), value.node.clone()))
                    .collect::<IndexMap<_, _>>(),
            };
            resolver = wiring.on_field(&site, resolver);
        }

        let return_type = named_type(&definition.ty.node);
        if self.definitions.is_abstract(return_type) {
            if let Some(type_resolver) = self.wiring.type_resolver(return_type) {
                resolver = tag_types(resolver, type_resolver.clone());
            }
        }

        let mut field = Field::new(field_name, type_ref(&definition.ty.node), move |ctx| {
            resolver(ctx)
        });
        if let Some(description) = &definition.description {
            field = field.description(description.node.as_str());
        }
        for argument in &definition.arguments {
            field = field.argument(input_value(&argument.node));
        }
        field
    }
}

fn interface_field(definition: &FieldDefinition) -> InterfaceField {
    let mut field = InterfaceField::new(
        definition.name.node.as_str(),
        type_ref(&definition.ty.node),
    );
    if let Some(description) = &definition.description {
        field = field.description(description.node.as_str());
    }
    for argument in &definition.arguments {
        field = field.argument(input_value(&argument.node));
    }
    field
}

fn input_value(definition: &InputValueDefinition) -> InputValue {
    let mut input = InputValue::new(definition.name.node.as_str(), type_ref(&definition.ty.node));
    if let Some(description) = &definition.description {
        input = input.description(description.node.as_str());
    }
    if let Some(default) = &definition.default_value {
        input = input.default_value(default.node.clone());
    }
    input
}

/// Converts a parsed type into an engine type reference.
#[must_use]
pub fn type_ref(ty: &Type) -> TypeRef {
    let base = match &ty.base {
        BaseType::Named(name) => TypeRef::Named(name.to_string().into()),
        BaseType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
    };
    if ty.nullable {
        base
    } else {
        TypeRef::NonNull(Box::new(base))
    }
}

/// Resolver reading `field_name` from the parent object value.
#[must_use]
pub fn property_resolver(field_name: String) -> Resolver {
    element::resolver(move |ctx| {
        let value = ctx
            .parent_value
            .as_value()
            .and_then(|parent| value::property(parent, &field_name))
            .cloned();
        FieldFuture::Value(value.map(FieldValue::value))
    })
}

fn tag_types(resolver: Resolver, type_resolver: TypeResolver) -> Resolver {
    element::resolver(move |ctx| {
        let inner = resolver(ctx);
        let type_resolver = type_resolver.clone();
        FieldFuture::new(async move {
            let value = element::resolve_field(inner).await?;
            Ok(value.map(|value| tag_value(value, &type_resolver)))
        })
    })
}

/// Tags `value`, or each item of a list of plain values.
///
/// Opaque list items cannot be rebuilt and are left as returned; resolvers
/// producing them tag the items with `FieldValue::with_type` themselves.
fn tag_value<'a>(value: FieldValue<'a>, type_resolver: &TypeResolver) -> FieldValue<'a> {
    if let Some(Value::List(items)) = value.as_value() {
        return FieldValue::list(
            items
                .iter()
                .map(|item| tag_value(FieldValue::value(item.clone()), type_resolver)),
        );
    }
    if let Some(items) = value.as_list() {
        let plain: Option<Vec<Value>> = items
            .iter()
            .map(|item| item.as_value().cloned())
            .collect();
        return match plain {
            Some(plain) => FieldValue::list(
                plain
                    .into_iter()
                    .map(|item| tag_value(FieldValue::value(item), type_resolver)),
            ),
            None => value,
        };
    }
    match type_resolver(&value) {
        Some(type_name) => value.with_type(type_name),
        None => value,
    }
}
