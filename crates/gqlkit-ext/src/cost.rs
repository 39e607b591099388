//! Per-request credit accounting.
//!
//! Fields are priced with a schema directive, by default `@cost(value: Int)`:
//!
//! ```graphql
//! directive @cost(value: Int!) on FIELD_DEFINITION
//!
//! type Query {
//!     search(text: String!): [Result!]! @cost(value: 10)
//! }
//! ```
//!
//! Unpriced fields and introspection fields cost nothing. Each field is
//! charged before it runs. The field whose charge pushes the total past the
//! limit is charged but not run, and every later field resolves to `null`
//! without being charged. An aborted request is answered with a single
//! `EXECUTION_ABORTED` error. Every response carries a `queryCost` extension
//! with `creditsUsed`, plus `creditLimit` when aborted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextRequest, NextResolve, ResolveInfo,
};
use async_graphql::{Name, Response, ServerResult, Value};
use gqlkit_core::{CostConfig, GqlKitError, Instrumentation, Result, SchemaDefinitions};
use indexmap::IndexMap;

/// Default pricing directive.
pub const COST_DIRECTIVE: &str = "cost";

/// Response extension key.
pub const QUERY_COST_EXTENSION: &str = "queryCost";

/// Field prices keyed by type, then field.
#[derive(Debug, Clone, Default)]
pub struct FieldCosts {
    costs: HashMap<String, HashMap<String, u64>>,
}

impl FieldCosts {
    /// Reads every `@{directive}` annotation from `definitions`.
    ///
    /// The price is the `value` argument, or the first argument.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::SchemaBuild`] for a missing, negative or
    /// non-integer price.
    pub fn from_definitions(definitions: &SchemaDefinitions, directive: &str) -> Result<Self> {
        let mut costs = Self::default();
        for (type_name, field_name, applied) in definitions.fields_with_directive(directive) {
            let argument = applied
                .get_argument("value")
                .or_else(|| applied.arguments.first().map(|(_, value)| value));
            let cost = match argument.map(|value| &value.node) {
                Some(Value::Number(n)) => n.as_u64(),
                _ => None,
            }
            .ok_or_else(|| {
                GqlKitError::SchemaBuild(format!(
                    "invalid @{directive} value on {type_name}.{field_name}"
                ))
            })?;
            costs.insert(type_name, field_name, cost);
        }
        Ok(costs)
    }

    /// Sets the price of one field.
    pub fn insert(&mut self, type_name: &str, field_name: &str, cost: u64) {
        self.costs
            .entry(type_name.to_string())
            .or_default()
            .insert(field_name.to_string(), cost);
    }

    /// The price of `type_name.field_name`, zero if unpriced.
    #[must_use]
    pub fn get(&self, type_name: &str, field_name: &str) -> u64 {
        self.costs
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
            .copied()
            .unwrap_or(0)
    }

    /// Number of priced fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.costs.values().map(HashMap::len).sum()
    }

    /// Returns `true` if no field is priced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of charging one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// Charged and within the limit; the field runs.
    Allowed,
    /// Charged and over the limit; the field is skipped.
    Breached,
    /// The request was already over the limit; nothing was charged.
    Skipped,
}

/// Credits spent by one request.
#[derive(Debug)]
pub struct CostState {
    limit: u64,
    used: AtomicU64,
}

impl CostState {
    /// Creates an empty state for `limit` credits.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
        }
    }

    /// Charges `cost` credits unless the limit was already exceeded.
    pub fn charge(&self, cost: u64) -> Charge {
        let mut current = self.used.load(Ordering::Acquire);
        loop {
            if current > self.limit {
                return Charge::Skipped;
            }
            let next = current.saturating_add(cost);
            match self
                .used
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) if next > self.limit => return Charge::Breached,
                Ok(_) => return Charge::Allowed,
                Err(actual) => current = actual,
            }
        }
    }

    /// Credits charged so far.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    /// The credit limit.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns `true` once the limit was exceeded.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.used() > self.limit
    }
}

/// Instrumentation enforcing a per-request credit limit.
#[derive(Debug, Clone)]
pub struct CostInstrumentation {
    limit: u64,
    directive: String,
}

impl CostInstrumentation {
    /// Creates an instrumentation allowing `limit` credits per request.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            directive: COST_DIRECTIVE.to_string(),
        }
    }

    /// Creates the instrumentation if configuration sets a limit.
    #[must_use]
    pub fn from_config(config: &CostConfig) -> Option<Self> {
        config.credit_limit.map(Self::new)
    }

    /// Reads prices from another directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    /// The credit limit.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl Instrumentation for CostInstrumentation {
    fn name(&self) -> &str {
        "cost"
    }

    fn extension(&self, definitions: &SchemaDefinitions) -> Result<Arc<dyn ExtensionFactory>> {
        let costs = FieldCosts::from_definitions(definitions, &self.directive)?;
        tracing::debug!(
            limit = self.limit,
            priced_fields = costs.len(),
            "configured cost instrumentation"
        );
        Ok(Arc::new(CostExtensionFactory {
            limit: self.limit,
            costs: Arc::new(costs),
        }))
    }
}

/// Creates the per-request cost extension.
#[derive(Debug, Clone)]
pub struct CostExtensionFactory {
    limit: u64,
    costs: Arc<FieldCosts>,
}

impl CostExtensionFactory {
    /// Creates a factory over a precomputed price table.
    #[must_use]
    pub fn new(limit: u64, costs: FieldCosts) -> Self {
        Self {
            limit,
            costs: Arc::new(costs),
        }
    }
}

impl ExtensionFactory for CostExtensionFactory {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(CostExtension {
            state: CostState::new(self.limit),
            costs: self.costs.clone(),
        })
    }
}

struct CostExtension {
    state: CostState,
    costs: Arc<FieldCosts>,
}

impl CostExtension {
    fn query_cost(&self, aborted: bool) -> Value {
        let mut cost = IndexMap::new();
        cost.insert(Name::new("creditsUsed"), Value::from(self.state.used()));
        if aborted {
            cost.insert(Name::new("creditLimit"), Value::from(self.state.limit()));
        }
        Value::Object(cost)
    }
}

#[async_trait::async_trait]
impl Extension for CostExtension {
    async fn request(&self, ctx: &ExtensionContext<'_>, next: NextRequest<'_>) -> Response {
        let response = next.run(ctx).await;
        if !self.state.is_aborted() {
            return response.extension(QUERY_COST_EXTENSION, self.query_cost(false));
        }

        let error = GqlKitError::CreditLimitExceeded {
            limit: self.state.limit(),
            used: self.state.used(),
        };
        tracing::debug!(
            limit = self.state.limit(),
            used = self.state.used(),
            "request exceeded credit limit"
        );
        Response::from_errors(vec![error.to_server_error()])
            .extension(QUERY_COST_EXTENSION, self.query_cost(true))
    }

    async fn resolve(
        &self,
        ctx: &ExtensionContext<'_>,
        info: ResolveInfo<'_>,
        next: NextResolve<'_>,
    ) -> ServerResult<Option<Value>> {
        let cost = if info.is_for_introspection || info.name.starts_with("__") {
            0
        } else {
            self.costs.get(info.parent_type, info.name)
        };
        match self.state.charge(cost) {
            Charge::Allowed => next.run(ctx, info).await,
            Charge::Breached => {
                tracing::trace!(
                    type_name = info.parent_type,
                    field_name = info.name,
                    cost,
                    "field breached credit limit"
                );
                Ok(None)
            }
            Charge::Skipped => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_sequence() {
        let state = CostState::new(3);
        assert_eq!(state.charge(1), Charge::Allowed);
        assert_eq!(state.charge(1), Charge::Allowed);
        assert_eq!(state.charge(1), Charge::Allowed);
        assert!(!state.is_aborted());
        assert_eq!(state.charge(1), Charge::Breached);
        assert!(state.is_aborted());
        assert_eq!(state.charge(5), Charge::Skipped);
        assert_eq!(state.charge(0), Charge::Skipped);
        assert_eq!(state.used(), 4);
    }

    #[test]
    fn test_zero_cost_before_abort_is_allowed() {
        let state = CostState::new(0);
        assert_eq!(state.charge(0), Charge::Allowed);
        assert_eq!(state.charge(1), Charge::Breached);
        assert_eq!(state.used(), 1);
    }

    #[test]
    fn test_concurrent_charges_are_monotonic() {
        let state = Arc::new(CostState::new(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| state.charge(1) == Charge::Breached)
                        .count()
                })
            })
            .collect();
        let breaches: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(breaches, 1);
        assert_eq!(state.used(), 51);
    }

    #[test]
    fn test_field_costs_from_sdl() {
        let defs = SchemaDefinitions::from_sdl(
            r"
            directive @cost(value: Int!) on FIELD_DEFINITION
            directive @price(amount: Int!) on FIELD_DEFINITION
            type Query {
                cheap: Int
                pricey: Int @cost(value: 7)
                other: Int @price(amount: 2)
            }
            ",
        )
        .unwrap();
        let costs = FieldCosts::from_definitions(&defs, "cost").unwrap();
        assert_eq!(costs.len(), 1);
        assert_eq!(costs.get("Query", "pricey"), 7);
        assert_eq!(costs.get("Query", "cheap"), 0);

        let costs = FieldCosts::from_definitions(&defs, "price").unwrap();
        assert_eq!(costs.get("Query", "other"), 2);
    }

    #[test]
    fn test_invalid_cost_value() {
        let defs = SchemaDefinitions::from_sdl(
            r#"type Query { a: Int @cost(value: "high") }"#,
        )
        .unwrap();
        let err = FieldCosts::from_definitions(&defs, "cost").unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_BUILD_FAILED");
    }

    #[test]
    fn test_from_config() {
        assert!(CostInstrumentation::from_config(&CostConfig::default()).is_none());
        let config = CostConfig {
            credit_limit: Some(10),
        };
        let cost = CostInstrumentation::from_config(&config).unwrap();
        assert_eq!(cost.limit(), 10);
    }
}
