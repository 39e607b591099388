use std::fmt::Write;

use indexmap::IndexMap;

use super::WiringVisitor;
use crate::element::{ElementKind, SourceTag, WiringElement};

/// Renders every field binding with its declaration site.
///
/// Types appear in first-binding order, fields sorted by name. Overwritten
/// bindings are listed too, in declaration order, so conflicts are visible:
///
/// ```text
/// type Query {
///     ping
///      ∟src/ping.rs:12:9
///      ∟src/admin.rs:40:13
/// }
/// ```
#[derive(Default)]
pub struct SchemaPrintingVisitor {
    types: IndexMap<String, IndexMap<String, Vec<SourceTag>>>,
}

impl WiringVisitor for SchemaPrintingVisitor {
    type Output = String;

    fn visit(&mut self, element: &WiringElement) {
        if let ElementKind::FieldBound {
            type_name,
            field_name,
            ..
        } = &element.kind
        {
            self.types
                .entry(type_name.clone())
                .or_default()
                .entry(field_name.clone())
                .or_default()
                .push(element.source.clone());
        }
    }

    fn finish(mut self) -> String {
        let mut out = String::new();
        for (type_name, fields) in &mut self.types {
            fields.sort_keys();
            let _ = writeln!(out, "type {type_name} {{");
            for (field_name, sources) in fields.iter() {
                let _ = writeln!(out, "\t{field_name}");
                for source in sources {
                    let _ = writeln!(out, "\t \u{221f}{source}");
                }
            }
            let _ = writeln!(out, "}}\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::visit_elements;
    use crate::element::noop;

    fn field(type_name: &str, field_name: &str, label: &str) -> WiringElement {
        WiringElement {
            source: SourceTag::label(label),
            kind: ElementKind::FieldBound {
                type_name: type_name.into(),
                field_name: field_name.into(),
                resolver: noop(),
            },
        }
    }

    #[test]
    fn test_print_groups_and_sorts() {
        let printed = visit_elements(
            SchemaPrintingVisitor::default(),
            &[
                field("Query", "zeta", "a.rs:1"),
                field("Query", "alpha", "b.rs:2"),
                field("User", "name", "c.rs:3"),
                field("Query", "alpha", "d.rs:4"),
            ],
        );

        let expected = "type Query {\n\talpha\n\t \u{221f}b.rs:2\n\t \u{221f}d.rs:4\n\tzeta\n\t \u{221f}a.rs:1\n}\n\n\
                        type User {\n\tname\n\t \u{221f}c.rs:3\n}\n\n";
        assert_eq!(printed, expected);
    }

    #[test]
    fn test_print_empty() {
        let printed = visit_elements(SchemaPrintingVisitor::default(), &[]);
        assert!(printed.is_empty());
    }
}
