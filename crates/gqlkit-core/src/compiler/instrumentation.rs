use std::sync::Arc;

use super::WiringVisitor;
use crate::element::{ElementKind, Instrumentation, WiringElement};

/// Collects instrumentations in declaration order.
#[derive(Default)]
pub struct InstrumentationVisitor {
    chain: Vec<Arc<dyn Instrumentation>>,
}

impl WiringVisitor for InstrumentationVisitor {
    type Output = Vec<Arc<dyn Instrumentation>>;

    fn visit(&mut self, element: &WiringElement) {
        if let ElementKind::InstrumentationDeclared(instrumentation) = &element.kind {
            tracing::trace!(instrumentation = instrumentation.name(), source = %element.source, "chained instrumentation");
            self.chain.push(instrumentation.clone());
        }
    }

    fn finish(self) -> Self::Output {
        self.chain
    }
}
