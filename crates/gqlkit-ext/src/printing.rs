//! Build plugin rendering the field bindings and where they were declared.

use std::fmt;
use std::sync::Arc;

use gqlkit_core::compiler::{SchemaPrintingVisitor, visit_elements};
use gqlkit_core::{BuilderPlugin, WiringElement};

type Writer = Arc<dyn Fn(&str) + Send + Sync>;

/// Prints the binding table once per build.
///
/// Logs it at `info` unless a writer is set.
#[derive(Clone, Default)]
pub struct SchemaPrintingPlugin {
    writer: Option<Writer>,
}

impl SchemaPrintingPlugin {
    /// Creates a plugin logging through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends the rendered table to `writer` instead of the log.
    #[must_use]
    pub fn with_writer<F>(writer: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            writer: Some(Arc::new(writer)),
        }
    }

    /// Renders the binding table of `elements`.
    #[must_use]
    pub fn render(elements: &[WiringElement]) -> String {
        visit_elements(SchemaPrintingVisitor::default(), elements)
    }
}

impl BuilderPlugin for SchemaPrintingPlugin {
    fn on_build(&self, elements: &[WiringElement]) {
        let printed = Self::render(elements);
        match &self.writer {
            Some(writer) => writer(&printed),
            None => tracing::info!("schema bindings:\n{printed}"),
        }
    }
}

impl fmt::Debug for SchemaPrintingPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaPrintingPlugin")
            .field("writer", &self.writer.is_some())
            .finish()
    }
}
