//! Wiring compiler.
//!
//! Folds the ordered element list into the artifacts the engine needs. Each
//! projection is a [`WiringVisitor`]:
//!
//! - [`RuntimeWiringVisitor`] - field, scalar, directive and type-resolver
//!   bindings grouped by type (last write wins per field)
//! - [`InstrumentationVisitor`] - the instrumentation chain in declaration order
//! - [`DataLoaderVisitor`] - data-loader blueprints (last write wins per key)
//! - [`SchemaPrintingVisitor`] - a diagnostic listing of field bindings
//!
//! [`compile`] runs the three runtime projections in a single pass.

mod instrumentation;
mod loaders;
mod printer;
mod wiring;

pub use instrumentation::InstrumentationVisitor;
pub use loaders::DataLoaderVisitor;
pub use printer::SchemaPrintingVisitor;
pub use wiring::{FieldBinding, RuntimeWiring, RuntimeWiringVisitor, TypeWiring};

use std::sync::Arc;

use crate::element::{Instrumentation, WiringElement};
use crate::loaders::DataLoaderBlueprints;

/// A projection of the element list.
pub trait WiringVisitor {
    /// What the projection produces.
    type Output;

    /// Observes one element.
    fn visit(&mut self, element: &WiringElement);

    /// Produces the projection.
    fn finish(self) -> Self::Output;
}

/// Runs `visitor` over `elements` in order.
pub fn visit_elements<V: WiringVisitor>(mut visitor: V, elements: &[WiringElement]) -> V::Output {
    for element in elements {
        visitor.visit(element);
    }
    visitor.finish()
}

/// Engine-ready artifacts of one schema build.
pub struct CompiledWiring {
    /// Grouped bindings.
    pub wiring: RuntimeWiring,
    /// Instrumentations, first declared first.
    pub instrumentations: Vec<Arc<dyn Instrumentation>>,
    /// Loader blueprints, one per key.
    pub data_loaders: DataLoaderBlueprints,
}

impl std::fmt::Debug for CompiledWiring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.instrumentations.iter().map(|i| i.name()).collect();
        f.debug_struct("CompiledWiring")
            .field("wiring", &self.wiring)
            .field("instrumentations", &names)
            .field("data_loaders", &self.data_loaders)
            .finish()
    }
}

/// Compiles `elements` in a single pass.
#[must_use]
pub fn compile(elements: &[WiringElement]) -> CompiledWiring {
    let mut wiring = RuntimeWiringVisitor::default();
    let mut instrumentations = InstrumentationVisitor::default();
    let mut data_loaders = DataLoaderVisitor::default();

    for element in elements {
        wiring.visit(element);
        instrumentations.visit(element);
        data_loaders.visit(element);
    }

    let compiled = CompiledWiring {
        wiring: wiring.finish(),
        instrumentations: instrumentations.finish(),
        data_loaders: data_loaders.finish(),
    };
    tracing::debug!(
        elements = elements.len(),
        types = compiled.wiring.types().count(),
        instrumentations = compiled.instrumentations.len(),
        data_loaders = compiled.data_loaders.len(),
        "compiled wiring"
    );
    compiled
}
