use indexmap::IndexMap;

use super::WiringVisitor;
use crate::element::{ElementKind, LoaderFactory, WiringElement};
use crate::loaders::{DataLoaderBlueprint, DataLoaderBlueprints};

/// Builds data-loader blueprints.
///
/// Declarations are resolved per key first; shared loaders are then
/// constructed once, and only for the declaration that won.
#[derive(Default)]
pub struct DataLoaderVisitor {
    declared: IndexMap<String, (bool, LoaderFactory)>,
}

impl WiringVisitor for DataLoaderVisitor {
    type Output = DataLoaderBlueprints;

    fn visit(&mut self, element: &WiringElement) {
        let ElementKind::DataLoaderDeclared {
            key,
            per_request,
            factory,
        } = &element.kind
        else {
            return;
        };

        if self
            .declared
            .insert(key.clone(), (*per_request, factory.clone()))
            .is_some()
        {
            tracing::debug!(key = %key, source = %element.source, "data loader overwritten");
        }
    }

    fn finish(self) -> DataLoaderBlueprints {
        let mut blueprints = DataLoaderBlueprints::new();
        for (key, (per_request, factory)) in self.declared {
            let blueprint = if per_request {
                DataLoaderBlueprint::PerRequest { key, factory }
            } else {
                DataLoaderBlueprint::Shared {
                    key,
                    loader: factory(),
                }
            };
            blueprints.insert(blueprint);
        }
        blueprints
    }
}
