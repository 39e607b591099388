//! Reflective modules: field bindings derived from a capability table.
//!
//! A [`TypeModule`] lists its resolver capabilities explicitly. Binding it to
//! a type with [`WiringBuilder::bind_type`](crate::WiringBuilder::bind_type)
//! turns every capability into a field binding and installs the bindings as
//! one synthetic [`TypeBuilderModule`].
//!
//! Two capability shapes are supported:
//!
//! - **Provider** - produces a resolver once at install time; takes no
//!   parameters.
//! - **Method** - runs on every resolution; takes either nothing or the
//!   resolution context.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::{FieldFuture, ResolverContext};

use crate::element::{self, Resolver, SourceTag};
use crate::error::{GqlKitError, Result};
use crate::module::TypeBuilderModule;

/// A declared capability parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// The field-resolution context.
    Context,
    /// Any other parameter.
    Named(String),
}

/// Method invoked on every resolution, with the context when it asked for one.
pub type MethodFn = Arc<dyn for<'a> Fn(Option<ResolverContext<'a>>) -> FieldFuture<'a> + Send + Sync>;

type ProviderFn = Arc<dyn Fn() -> Resolver + Send + Sync>;

fn method_fn<F>(f: F) -> MethodFn
where
    F: for<'a> Fn(Option<ResolverContext<'a>>) -> FieldFuture<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Implementation of a capability.
#[derive(Clone)]
pub enum CapabilityBody {
    /// Produces a resolver object.
    Provider(ProviderFn),
    /// Resolves the field directly.
    Method(MethodFn),
}

/// One resolver-tagged capability of a reflective module.
#[derive(Clone)]
pub struct Capability {
    name: String,
    rename: Option<String>,
    params: Vec<Param>,
    body: CapabilityBody,
}

impl Capability {
    /// Creates a capability with an explicit parameter list.
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: CapabilityBody) -> Self {
        Self {
            name: name.into(),
            rename: None,
            params,
            body,
        }
    }

    /// A capability producing a resolver object.
    pub fn provider<F>(name: impl Into<String>, provide: F) -> Self
    where
        F: Fn() -> Resolver + Send + Sync + 'static,
    {
        Self::new(name, Vec::new(), CapabilityBody::Provider(Arc::new(provide)))
    }

    /// A capability called with no arguments on every resolution.
    pub fn method<F, Fut>(name: impl Into<String>, method: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = async_graphql::Result<Option<Value>>> + Send + 'static,
    {
        let body = method_fn(move |_ctx| FieldFuture::new(method()));
        Self::new(name, Vec::new(), CapabilityBody::Method(body))
    }

    /// A capability called with the resolution context.
    pub fn method_with_context<F>(name: impl Into<String>, method: F) -> Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        let body = method_fn(move |ctx| match ctx {
            Some(ctx) => method(ctx),
            None => FieldFuture::Value(None),
        });
        Self::new(name, vec![Param::Context], CapabilityBody::Method(body))
    }

    /// Binds the capability under another field name.
    #[must_use]
    pub fn rename(mut self, field_name: impl Into<String>) -> Self {
        self.rename = Some(field_name.into());
        self
    }

    /// The capability's own name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field name the capability binds to.
    #[must_use]
    pub fn field_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }

    /// Declared parameters.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Adapts the capability into a resolver.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::InvalidResolverShape`] if a provider declares
    /// parameters, or a method declares anything other than nothing or a
    /// single context parameter.
    pub fn to_resolver(&self) -> Result<Resolver> {
        match &self.body {
            CapabilityBody::Provider(provide) => {
                if !self.params.is_empty() {
                    return Err(self.invalid_shape(format!(
                        "resolver providers take no parameters, found {}",
                        self.params.len()
                    )));
                }
                Ok(provide())
            }
            CapabilityBody::Method(method) => {
                let pass_context = match self.params.as_slice() {
                    [] => false,
                    [Param::Context] => true,
                    [Param::Named(name)] => {
                        return Err(self.invalid_shape(format!(
                            "parameter `{name}` is not the resolution context"
                        )));
                    }
                    params => {
                        return Err(self.invalid_shape(format!(
                            "expected at most one context parameter, found {}",
                            params.len()
                        )));
                    }
                };
                let method = method.clone();
                Ok(element::resolver(move |ctx| {
                    if pass_context {
                        method(Some(ctx))
                    } else {
                        method(None)
                    }
                }))
            }
        }
    }

    fn invalid_shape(&self, reason: String) -> GqlKitError {
        GqlKitError::InvalidResolverShape {
            capability: self.name.clone(),
            reason,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            CapabilityBody::Provider(_) => "provider",
            CapabilityBody::Method(_) => "method",
        };
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("rename", &self.rename)
            .field("params", &self.params)
            .field("kind", &kind)
            .finish()
    }
}

/// A module whose field bindings come from its capability table.
pub trait TypeModule {
    /// The module's resolver capabilities.
    fn capabilities(&self) -> Vec<Capability>;

    /// Name used in source tags.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Derives the synthetic module binding `module`'s capabilities to `type_name`.
///
/// Every capability is adapted before the module is returned, so a shape
/// error leaves the registry untouched.
pub(crate) fn derive_module<M: TypeModule + ?Sized>(
    type_name: String,
    module: &M,
) -> Result<TypeBuilderModule> {
    let module_name = module.name().to_string();
    let bindings = module
        .capabilities()
        .iter()
        .map(|capability| -> Result<_> {
            let resolver = capability.to_resolver()?;
            let source = SourceTag::label(format!("{module_name}::{}", capability.name()));
            Ok((capability.field_name().to_string(), resolver, source))
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        module = %module_name,
        type_name = %type_name,
        fields = bindings.len(),
        "derived reflective bindings"
    );

    let module = TypeBuilderModule::new(type_name, move |t| {
        for (field_name, resolver, source) in &bindings {
            t.bind(field_name.clone(), resolver.clone(), source.clone());
        }
    });
    Ok(module.labeled(module_name))
}
