//! Parsed-document cache.
//!
//! [`DocumentCache`] is an engine extension factory. Each request gets an
//! extension that serves `parse_query` and `validation` from two shared
//! [`QueryCache`]s. Documents are keyed by the query text. Validation also
//! depends on the operation name and the variable values, so its key is
//! [`validation_key`]. Parse and validation failures are cached like
//! successes and returned verbatim on later lookups.

use std::sync::Arc;

use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextParseQuery, NextPrepareRequest,
    NextValidation,
};
use async_graphql::parser::types::ExecutableDocument;
use async_graphql::{Request, ServerError, ServerResult, ValidationResult, Variables};
use gqlkit_core::CacheConfig;
use parking_lot::Mutex;

use crate::cache::QueryCache;

/// Outcome of parsing one query text.
#[derive(Debug, Clone)]
pub enum DocumentEntry {
    /// The parsed document.
    Valid(Arc<ExecutableDocument>),
    /// The parse error.
    Invalid(ServerError),
}

impl DocumentEntry {
    /// Parses `query` without touching any cache.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        match async_graphql::parser::parse_query(query) {
            Ok(document) => Self::Valid(Arc::new(document)),
            Err(e) => Self::Invalid(e.into()),
        }
    }

    /// Returns `true` for parsed documents.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    fn into_result(self) -> ServerResult<ExecutableDocument> {
        match self {
            Self::Valid(document) => Ok(document.as_ref().clone()),
            Self::Invalid(error) => Err(error),
        }
    }
}

impl From<ServerResult<ExecutableDocument>> for DocumentEntry {
    fn from(result: ServerResult<ExecutableDocument>) -> Self {
        match result {
            Ok(document) => Self::Valid(Arc::new(document)),
            Err(error) => Self::Invalid(error),
        }
    }
}

type ValidationEntry = Result<ValidationResult, Vec<ServerError>>;

/// Cache key of one validation outcome.
///
/// Joins the query text, the operation name and the JSON form of the
/// variables. Variables that fail to serialize yield `None` and the request is
/// validated uncached.
#[must_use]
pub fn validation_key(request: &Request) -> Option<String> {
    let variables = serde_json::to_string(&request.variables).ok()?;
    let operation = request.operation_name.as_deref().unwrap_or_default();
    Some(format!("{operation}\u{0}{variables}\u{0}{}", request.query))
}

/// Shared cache of parsed documents and validation outcomes.
///
/// Clones share the same entries.
#[derive(Debug, Clone)]
pub struct DocumentCache {
    documents: QueryCache<DocumentEntry>,
    validations: QueryCache<ValidationEntry>,
}

impl DocumentCache {
    /// Creates a cache holding at most `capacity` documents.
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            documents: QueryCache::with_capacity(capacity),
            validations: QueryCache::with_capacity(capacity),
        }
    }

    /// Creates a cache sized from configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_capacity(config.documents)
    }

    /// Returns the entry for `query`, parsing it once if absent.
    pub async fn document(&self, query: &str) -> DocumentEntry {
        self.documents
            .get_or_compute(query, async { DocumentEntry::parse(query) })
            .await
    }

    /// Stores an already parsed entry for `query`.
    pub async fn seed(&self, query: &str, entry: DocumentEntry) {
        self.documents.insert(query, entry).await;
    }

    /// The document cache.
    #[must_use]
    pub fn documents(&self) -> &QueryCache<DocumentEntry> {
        &self.documents
    }

    /// Number of cached documents.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.documents.entry_count()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.documents.invalidate_all();
        self.validations.invalidate_all();
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl ExtensionFactory for DocumentCache {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(CachedDocumentExtension {
            cache: self.clone(),
            validation_key: Mutex::new(None),
        })
    }
}

struct CachedDocumentExtension {
    cache: DocumentCache,
    validation_key: Mutex<Option<String>>,
}

#[async_trait::async_trait]
impl Extension for CachedDocumentExtension {
    async fn prepare_request(
        &self,
        ctx: &ExtensionContext<'_>,
        request: Request,
        next: NextPrepareRequest<'_>,
    ) -> ServerResult<Request> {
        // Inner extensions may rewrite the request; key on what they return.
        let request = next.run(ctx, request).await?;
        *self.validation_key.lock() = validation_key(&request);
        Ok(request)
    }

    async fn parse_query(
        &self,
        ctx: &ExtensionContext<'_>,
        query: &str,
        variables: &Variables,
        next: NextParseQuery<'_>,
    ) -> ServerResult<ExecutableDocument> {
        let entry = self
            .cache
            .documents
            .get_or_compute(query, async {
                tracing::trace!(len = query.len(), "parsing uncached document");
                DocumentEntry::from(next.run(ctx, query, variables).await)
            })
            .await;
        entry.into_result()
    }

    async fn validation(
        &self,
        ctx: &ExtensionContext<'_>,
        next: NextValidation<'_>,
    ) -> Result<ValidationResult, Vec<ServerError>> {
        let key = self.validation_key.lock().clone();
        match key {
            Some(key) => {
                self.cache
                    .validations
                    .get_or_compute(&key, next.run(ctx))
                    .await
            }
            None => next.run(ctx).await,
        }
    }
}
