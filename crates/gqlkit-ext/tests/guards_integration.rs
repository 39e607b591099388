//! Integration tests for request guards on a built kit.
//!
//! Covers credit limits, persisted queries and the document cache against
//! real query execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_graphql::dynamic::{FieldFuture, Schema};
use async_graphql::extensions::{Extension, ExtensionContext, ExtensionFactory, NextParseQuery};
use async_graphql::parser::types::ExecutableDocument;
use async_graphql::{Request, ServerResult, Value, Variables};
use gqlkit_core::element::{self, Resolver};
use gqlkit_core::{
    BuildOptions, FactoryInstrumentation, GraphKit, Module, RequestFactory, StringSchemaSource,
    graph_module,
};
use gqlkit_ext::{
    CostInstrumentation, DocumentCache, PersistedQueryCache, PersistedQueryExtension,
    SchemaPrintingPlugin, query_hash,
};
use serde_json::json;

// =============================================================================
// Helpers
// =============================================================================

const COST_SDL: &str = r"
directive @cost(value: Int!) on FIELD_DEFINITION

type Query {
    a: Int @cost(value: 1)
    b: Int @cost(value: 1)
    c: Int @cost(value: 1)
    d: Int @cost(value: 1)
    free: Int
}
";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn build(sdl: &str, module: impl Module) -> (Schema, RequestFactory) {
    init_tracing();
    let options = BuildOptions::builder()
        .schema_source(StringSchemaSource::new(sdl))
        .build();
    GraphKit::build(options, module)
        .expect("kit builds")
        .finish()
        .expect("schema finishes")
}

fn counted(hits: Arc<AtomicUsize>) -> Resolver {
    element::resolver(move |_ctx| {
        let hits = hits.clone();
        FieldFuture::new(async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Value::from(1)))
        })
    })
}

fn persisted_request(hash: &str, query: &str) -> Request {
    let mut request = Request::new(query);
    let extension = Value::from_json(json!({"version": 1, "sha256Hash": hash}))
        .expect("valid extension");
    request
        .extensions
        .insert("persistedQuery".to_string(), extension);
    request
}

/// Counts parse calls that reach the engine.
struct ParseCounter(Arc<AtomicUsize>);

impl ExtensionFactory for ParseCounter {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(ParseCounterExtension(self.0.clone()))
    }
}

struct ParseCounterExtension(Arc<AtomicUsize>);

#[async_trait::async_trait]
impl Extension for ParseCounterExtension {
    async fn parse_query(
        &self,
        ctx: &ExtensionContext<'_>,
        query: &str,
        variables: &Variables,
        next: NextParseQuery<'_>,
    ) -> ServerResult<ExecutableDocument> {
        self.0.fetch_add(1, Ordering::SeqCst);
        next.run(ctx, query, variables).await
    }
}

// =============================================================================
// Cost instrumentation
// =============================================================================

fn cost_module(limit: u64, hits: Arc<AtomicUsize>) -> impl Module {
    graph_module("Priced", move |b| {
        b.instrumentation(CostInstrumentation::new(limit));
        let hits = hits.clone();
        b.query(move |q| {
            for field in ["a", "b", "c", "d", "free"] {
                q.field(field, counted(hits.clone()));
            }
        });
        Ok(())
    })
}

#[tokio::test]
async fn test_credit_limit_breach_aborts_request() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (schema, requests) = build(COST_SDL, cost_module(3, hits.clone()));

    let response = schema.execute(requests.new_request("{ a b c d }")).await;

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(response.errors.len(), 1);
    let error = &response.errors[0];
    assert_eq!(
        error.message,
        "Exceeded credit limit for query. Max allowed credits: 3. Credits required for query: 4"
    );
    let extensions = error.extensions.as_ref().expect("error extensions");
    assert_eq!(
        extensions.get("code"),
        Some(&Value::String("EXECUTION_ABORTED".into()))
    );
    assert_eq!(
        response.extensions["queryCost"].clone().into_json().unwrap(),
        json!({"creditsUsed": 4, "creditLimit": 3})
    );
}

#[tokio::test]
async fn test_within_limit_reports_credits_used() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (schema, requests) = build(COST_SDL, cost_module(3, hits.clone()));

    let response = schema
        .execute(requests.new_request("{ __typename a b free }"))
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({"__typename": "Query", "a": 1, "b": 1, "free": 1})
    );
    assert_eq!(
        response.extensions["queryCost"].clone().into_json().unwrap(),
        json!({"creditsUsed": 2})
    );
}

#[tokio::test]
async fn test_cost_state_is_per_request() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (schema, requests) = build(COST_SDL, cost_module(3, hits));

    for _ in 0..3 {
        let response = schema.execute(requests.new_request("{ a b c }")).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.extensions["queryCost"].clone().into_json().unwrap(),
            json!({"creditsUsed": 3})
        );
    }
}

// =============================================================================
// Persisted queries
// =============================================================================

fn guarded_module(persisted: PersistedQueryExtension, documents: DocumentCache) -> impl Module {
    graph_module("Guarded", move |b| {
        b.instrumentation(FactoryInstrumentation::new("persisted", persisted.clone()));
        b.instrumentation(FactoryInstrumentation::new("documents", documents.clone()));
        b.query(|q| {
            q.value("field", "value");
        });
        Ok(())
    })
}

#[tokio::test]
async fn test_persisted_query_lifecycle() {
    let documents = DocumentCache::with_capacity(100);
    let queries = PersistedQueryCache::with_capacity(100);
    let persisted = PersistedQueryExtension::new(queries.clone(), documents.clone());
    let (schema, requests) = build(
        "type Query { field: String }",
        guarded_module(persisted, documents.clone()),
    );

    let query = "{ field }";
    let hash = query_hash(query);

    let response = schema
        .execute(requests.prepare(persisted_request(&hash, "")))
        .await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "PersistedQueryNotFound");

    let response = schema
        .execute(requests.prepare(persisted_request(&hash, query)))
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(response.data.into_json().unwrap(), json!({"field": "value"}));

    let response = schema
        .execute(requests.prepare(persisted_request(&hash, "")))
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(response.data.into_json().unwrap(), json!({"field": "value"}));

    queries.queries().run_pending_tasks().await;
    assert_eq!(queries.len(), 1);
    assert!(documents.documents().get(query).await.is_some());
}

#[tokio::test]
async fn test_persisted_query_hash_mismatch() {
    let documents = DocumentCache::with_capacity(100);
    let persisted = PersistedQueryExtension::new(
        PersistedQueryCache::with_capacity(100),
        documents.clone(),
    );
    let (schema, requests) = build(
        "type Query { field: String }",
        guarded_module(persisted, documents),
    );

    let response = schema
        .execute(requests.prepare(persisted_request("abc", "{ field }")))
        .await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "provided sha does not match query");
}

// =============================================================================
// Document cache
// =============================================================================

fn counted_parse_module(documents: DocumentCache, parses: Arc<AtomicUsize>) -> impl Module {
    graph_module("Documents", move |b| {
        b.instrumentation(FactoryInstrumentation::new("documents", documents.clone()));
        b.instrumentation(FactoryInstrumentation::new(
            "parse-counter",
            ParseCounter(parses.clone()),
        ));
        b.query(|q| {
            q.value("field", "value");
        });
        Ok(())
    })
}

#[tokio::test]
async fn test_concurrent_requests_parse_once() {
    let documents = DocumentCache::with_capacity(100);
    let parses = Arc::new(AtomicUsize::new(0));
    let (schema, requests) = build(
        "type Query { field: String }",
        counted_parse_module(documents, parses.clone()),
    );

    let executions = (0..8).map(|_| {
        let schema = schema.clone();
        let request = requests.new_request("{ field }");
        tokio::spawn(async move { schema.execute(request).await })
    });
    for response in futures_util::future::join_all(executions).await {
        let response = response.unwrap();
        assert!(response.errors.is_empty(), "{:?}", response.errors);
    }
    assert_eq!(parses.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_failures_are_identical() {
    let documents = DocumentCache::with_capacity(100);
    let parses = Arc::new(AtomicUsize::new(0));
    let (schema, requests) = build(
        "type Query { field: String }",
        counted_parse_module(documents, parses.clone()),
    );

    let first = schema.execute(requests.new_request("{ field")).await;
    let second = schema.execute(requests.new_request("{ field")).await;
    assert_eq!(first.errors.len(), 1);
    assert_eq!(first.errors[0].message, second.errors[0].message);
    assert_eq!(first.errors[0].locations, second.errors[0].locations);
    assert_eq!(parses.load(Ordering::SeqCst), 1);

    let first = schema.execute(requests.new_request("{ missing }")).await;
    let second = schema.execute(requests.new_request("{ missing }")).await;
    assert!(!first.errors.is_empty());
    assert_eq!(first.errors[0].message, second.errors[0].message);
}

#[tokio::test]
async fn test_bad_variables_do_not_poison_later_requests() {
    let documents = DocumentCache::with_capacity(100);
    let parses = Arc::new(AtomicUsize::new(0));
    let (cache, counter) = (documents.clone(), parses.clone());
    let module = graph_module("Echo", move |b| {
        b.instrumentation(FactoryInstrumentation::new("documents", cache.clone()));
        b.instrumentation(FactoryInstrumentation::new(
            "parse-counter",
            ParseCounter(counter.clone()),
        ));
        b.query(|q| {
            q.resolve("echo", |ctx| {
                FieldFuture::new(async move {
                    let n = ctx.args.try_get("n")?.i64()?;
                    Ok(Some(Value::from(n)))
                })
            });
        });
        Ok(())
    });
    let (schema, requests) = build("type Query { echo(n: Int!): Int }", module);

    let query = "query($n: Int!) { echo(n: $n) }";
    let echo = |variables: serde_json::Value| {
        requests.prepare(Request::new(query).variables(Variables::from_json(variables)))
    };

    let rejected = schema.execute(echo(json!({"n": "oops"}))).await;
    assert_eq!(rejected.errors.len(), 1);

    let accepted = schema.execute(echo(json!({"n": 5}))).await;
    assert!(accepted.errors.is_empty(), "{:?}", accepted.errors);
    assert_eq!(accepted.data.into_json().unwrap(), json!({"echo": 5}));

    let rejected_again = schema.execute(echo(json!({"n": "oops"}))).await;
    assert_eq!(rejected.errors[0].message, rejected_again.errors[0].message);
    assert_eq!(parses.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Schema printing
// =============================================================================

#[test]
fn test_printing_plugin_runs_on_build() {
    let printed = Arc::new(parking_lot::Mutex::new(String::new()));
    let sink = printed.clone();
    let options = BuildOptions::builder()
        .schema_source(StringSchemaSource::new("type Query { field: String }"))
        .with_plugin(SchemaPrintingPlugin::with_writer(move |text| {
            sink.lock().push_str(text);
        }))
        .build();

    GraphKit::build(
        options,
        graph_module("Printed", |b| {
            b.query(|q| {
                q.value("field", "value");
            });
            Ok(())
        }),
    )
    .unwrap();

    let printed = printed.lock().clone();
    assert!(printed.contains("type Query {"));
    assert!(printed.contains("\tfield"));
    assert!(printed.contains("guards_integration.rs"));
}
