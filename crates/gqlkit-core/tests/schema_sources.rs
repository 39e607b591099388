//! Schema discovery and configuration loading from disk.

use std::fs;

use gqlkit_core::{
    BuildOptions, DirectorySchemaSource, GqlKitConfig, GraphKit, SchemaSource, query_module,
};
use serde_json::json;

#[test]
fn test_directory_documents_are_merged() {
    let dir = tempfile::tempdir().expect("tmp dir");
    fs::create_dir_all(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("a.graphqls"), "type Query { a: String }").unwrap();
    fs::write(
        dir.path().join("nested/b.graphqls"),
        "extend type Query { b: String }",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not a schema").unwrap();

    let source = DirectorySchemaSource::new(dir.path());
    assert_eq!(source.load().unwrap().len(), 2);

    let options = BuildOptions::builder().schema_source(source).build();
    let kit = GraphKit::build(
        options,
        query_module(|q| {
            q.value("a", "A");
            q.value("b", "B");
        }),
    )
    .unwrap();
    assert!(kit.definitions.field("Query", "b").is_some());

    let (schema, requests) = kit.finish().unwrap();
    let response = tokio_test::block_on(schema.execute(requests.new_request("{ a b }")));
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({"a": "A", "b": "B"})
    );
}

#[test]
fn test_config_drives_directory_discovery() {
    let dir = tempfile::tempdir().expect("tmp dir");
    fs::write(dir.path().join("schema.gql"), "type Query { ping: String }").unwrap();
    fs::write(dir.path().join("ignored.graphqls"), "type Query {").unwrap();

    let text = format!(
        r#"
[schema]
directories = ["{}"]
extension = "gql"

[limits]
max_depth = 5
introspection = false
"#,
        dir.path().display()
    );
    let config = GqlKitConfig::from_toml_str(&text).unwrap();
    assert_eq!(config.limits.max_depth, 5);
    assert_eq!(config.limits.max_complexity, 500);

    let options = BuildOptions::builder().config(config).build();
    let kit = GraphKit::build(
        options,
        query_module(|q| {
            q.value("ping", "pong");
        }),
    );
    assert!(kit.is_ok());
}

#[test]
fn test_missing_directory_is_a_source_error() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let source = DirectorySchemaSource::new(dir.path().join("missing"));
    let err = source.load().unwrap_err();
    assert_eq!(err.error_code(), "SCHEMA_SOURCE_ERROR");
}
