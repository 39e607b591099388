//! Persisted queries.
//!
//! [`PersistedQueryCache`] maps a query id (the hex SHA-256 of the query
//! text) to the registered text and its parsed document. A lookup by id alone
//! succeeds once the text was registered; a miss without text fails with
//! [`GqlKitError::PersistedQueryNotFound`] and leaves the cache untouched.
//!
//! [`PersistedQueryExtension`] speaks the automatic persisted query protocol:
//!
//! ```json
//! { "extensions": { "persistedQuery": { "version": 1, "sha256Hash": "<hex>" } } }
//! ```

use std::future::Future;
use std::sync::Arc;

use async_graphql::extensions::{Extension, ExtensionContext, ExtensionFactory, NextPrepareRequest};
use async_graphql::{Request, ServerError, ServerResult};
use gqlkit_core::{CacheConfig, GqlKitError, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::cache::QueryCache;
use crate::document::{DocumentCache, DocumentEntry};

/// Request extension key of the protocol.
pub const EXTENSION_KEY: &str = "persistedQuery";

/// Hex-encoded SHA-256 of `query`, the id a client sends.
#[must_use]
pub fn query_hash(query: &str) -> String {
    hex::encode(Sha256::digest(query.as_bytes()))
}

/// A registered query.
#[derive(Debug, Clone)]
pub struct PersistedQuery {
    /// The query text.
    pub query: Arc<str>,
    /// The parsed text.
    pub document: DocumentEntry,
}

/// Cache of registered queries keyed by id.
#[derive(Debug, Clone)]
pub struct PersistedQueryCache {
    queries: QueryCache<PersistedQuery>,
}

impl PersistedQueryCache {
    /// Creates a cache holding at most `capacity` queries.
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            queries: QueryCache::with_capacity(capacity),
        }
    }

    /// Creates a cache sized from configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_capacity(config.persisted_queries)
    }

    /// Looks up `id`, registering `supplied` through `on_miss` when absent.
    ///
    /// Concurrent misses for the same id run `on_miss` once. Its errors are
    /// returned to every waiting caller and never cached.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::PersistedQueryNotFound`] on a miss without
    /// query text, or the error of `on_miss`.
    pub async fn get_persisted<F, Fut>(
        &self,
        id: &str,
        supplied: Option<&str>,
        on_miss: F,
    ) -> Result<PersistedQuery>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<PersistedQuery>>,
    {
        if let Some(found) = self.queries.get(id).await {
            return Ok(found);
        }
        let Some(query) = supplied else {
            return Err(GqlKitError::PersistedQueryNotFound { id: id.to_string() });
        };
        self.queries
            .try_get_or_compute(id, on_miss(query.to_string()))
            .await
            .map_err(|e| e.as_ref().clone())
    }

    /// Looks up `id`, verifying and parsing `supplied` on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::PersistedQueryNotFound`] on a miss without
    /// text and [`GqlKitError::PersistedQueryHashMismatch`] when the text
    /// does not hash to `id`.
    pub async fn resolve(&self, id: &str, supplied: Option<&str>) -> Result<PersistedQuery> {
        self.get_persisted(id, supplied, |query| async move { register(id, query) })
            .await
    }

    /// Number of registered queries.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.queries.entry_count()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying cache.
    #[must_use]
    pub fn queries(&self) -> &QueryCache<PersistedQuery> {
        &self.queries
    }
}

impl Default for PersistedQueryCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

fn register(id: &str, query: String) -> Result<PersistedQuery> {
    if query_hash(&query) != id {
        return Err(GqlKitError::PersistedQueryHashMismatch { id: id.to_string() });
    }
    tracing::debug!(id = %id, "registered persisted query");
    let document = DocumentEntry::parse(&query);
    Ok(PersistedQuery {
        query: query.into(),
        document,
    })
}

#[derive(Debug, Deserialize)]
struct PersistedQueryRequest {
    version: i32,
    #[serde(rename = "sha256Hash")]
    sha256_hash: String,
}

/// Engine extension resolving persisted query ids in incoming requests.
///
/// Registered documents are also stored in the shared [`DocumentCache`], so
/// the following parse step is served from it.
#[derive(Debug, Clone, Default)]
pub struct PersistedQueryExtension {
    queries: PersistedQueryCache,
    documents: DocumentCache,
}

impl PersistedQueryExtension {
    /// Creates the extension over `queries`, seeding `documents`.
    #[must_use]
    pub fn new(queries: PersistedQueryCache, documents: DocumentCache) -> Self {
        Self { queries, documents }
    }

    /// The persisted query cache.
    #[must_use]
    pub fn queries(&self) -> &PersistedQueryCache {
        &self.queries
    }

    async fn apply(&self, mut request: Request) -> ServerResult<Request> {
        let Some(value) = request.extensions.remove(EXTENSION_KEY) else {
            return Ok(request);
        };
        let persisted: PersistedQueryRequest = async_graphql::from_value(value).map_err(|_| {
            ServerError::new("Invalid \"PersistedQuery\" extension configuration.", None)
        })?;
        if persisted.version != 1 {
            return Err(ServerError::new(
                format!(
                    "Only the \"PersistedQuery\" extension of version \"1\" is supported, and the current version is \"{}\".",
                    persisted.version
                ),
                None,
            ));
        }

        let supplied = (!request.query.is_empty()).then_some(request.query.as_str());
        let found = self
            .queries
            .resolve(&persisted.sha256_hash, supplied)
            .await
            .map_err(|e| e.to_server_error())?;

        self.documents
            .seed(&found.query, found.document.clone())
            .await;
        request.query = found.query.to_string();
        Ok(request)
    }
}

impl ExtensionFactory for PersistedQueryExtension {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(self.clone())
    }
}

#[async_trait::async_trait]
impl Extension for PersistedQueryExtension {
    async fn prepare_request(
        &self,
        ctx: &ExtensionContext<'_>,
        request: Request,
        next: NextPrepareRequest<'_>,
    ) -> ServerResult<Request> {
        let request = self.apply(request).await?;
        next.run(ctx, request).await
    }
}
