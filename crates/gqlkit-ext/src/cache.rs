//! Bounded single-flight cache keyed by query text or query id.
//!
//! Backed by `moka::future::Cache` with an LRU eviction policy. Concurrent
//! lookups of the same missing key share one computation; the value becomes
//! an entry only once that computation completes, so an in-flight key is
//! never evicted.

use std::future::Future;
use std::sync::Arc;

use moka::future::Cache;
use moka::policy::EvictionPolicy;

/// Default number of entries.
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// LRU cache with single-flight computation.
#[derive(Clone)]
pub struct QueryCache<V> {
    inner: Cache<String, V>,
    capacity: u64,
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            capacity,
        }
    }

    /// Returns the cached value for `key`, computing it once if absent.
    ///
    /// Every outcome of `compute` is stored, failures included when `V`
    /// represents them.
    pub async fn get_or_compute<F>(&self, key: &str, compute: F) -> V
    where
        F: Future<Output = V>,
    {
        self.inner.get_with(key.to_string(), compute).await
    }

    /// Like [`QueryCache::get_or_compute`], but errors are returned to every
    /// waiting caller and not stored.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `compute`.
    pub async fn try_get_or_compute<F, E>(&self, key: &str, compute: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        self.inner.try_get_with(key.to_string(), compute).await
    }

    /// Returns the cached value for `key`.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.inner.insert(key.into(), value).await;
    }

    /// Approximate number of entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Applies pending evictions and bookkeeping.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Removes every entry.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

impl<V> Default for QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<V> std::fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_or_compute_stores_value() {
        let cache = QueryCache::<String>::with_capacity(10);
        let value = cache
            .get_or_compute("a", async { "computed".to_string() })
            .await;
        assert_eq!(value, "computed");

        let again = cache.get_or_compute("a", async { "other".to_string() }).await;
        assert_eq!(again, "computed");
        assert_eq!(cache.get("a").await.as_deref(), Some("computed"));
    }

    #[tokio::test]
    async fn test_single_flight() {
        let cache = QueryCache::<usize>::with_capacity(10);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("same", async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        calls.fetch_add(1, Ordering::SeqCst) + 100
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 100);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_try_get_does_not_store_errors() {
        let cache = QueryCache::<u32>::with_capacity(10);
        let err = cache
            .try_get_or_compute("k", async { Err::<u32, _>("boom") })
            .await
            .unwrap_err();
        assert_eq!(*err, "boom");
        assert!(cache.get("k").await.is_none());

        let value = cache
            .try_get_or_compute("k", async { Ok::<_, &str>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let cache = QueryCache::<u32>::with_capacity(2);
        for i in 0..10u32 {
            cache.insert(format!("k{i}"), i).await;
        }
        cache.run_pending_tasks().await;
        assert!(cache.entry_count() <= 2);
        assert_eq!(cache.capacity(), 2);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let cache = QueryCache::<u32>::with_capacity(2);
        cache.insert("a", 1).await;
        cache.insert("b", 2).await;
        cache.run_pending_tasks().await;

        assert_eq!(cache.get("a").await, Some(1));
        cache.run_pending_tasks().await;

        cache.insert("c", 3).await;
        cache.run_pending_tasks().await;

        assert_eq!(cache.get("a").await, Some(1));
        assert_eq!(cache.get("c").await, Some(3));
        assert!(cache.get("b").await.is_none());
    }

    #[tokio::test]
    async fn test_distinct_keys_compute_independently() {
        let cache = QueryCache::<u32>::with_capacity(10);

        let slow = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .get_or_compute("slow", std::future::pending::<u32>())
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fast = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_compute("fast", async { 7 }),
        )
        .await;
        assert_eq!(fast.ok(), Some(7));
        assert!(!slow.is_finished());
        slow.abort();
    }

    #[tokio::test]
    async fn test_same_key_waiter_blocks_behind_hung_computation() {
        let cache = QueryCache::<u32>::with_capacity(10);

        let hung = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .get_or_compute("k", std::future::pending::<u32>())
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // No timeout of its own: a waiter stays parked until the first
        // computation finishes.
        let waiter = tokio::time::timeout(
            Duration::from_millis(100),
            cache.get_or_compute("k", async { 1 }),
        )
        .await;
        assert!(waiter.is_err());

        hung.abort();
        let _ = hung.await;
        let value = cache.get_or_compute("k", async { 2 }).await;
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_in_flight_key_survives_eviction_pressure() {
        let cache = QueryCache::<u32>::with_capacity(1);
        let (release, gate) = tokio::sync::oneshot::channel::<()>();

        let pending = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .get_or_compute("k", async move {
                        let _ = gate.await;
                        42
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        for i in 0..10u32 {
            cache.insert(format!("other{i}"), i).await;
        }
        cache.run_pending_tasks().await;

        release.send(()).unwrap();
        assert_eq!(pending.await.unwrap(), 42);
        assert_eq!(cache.get_or_compute("k", async { 0 }).await, 42);
    }

    #[test]
    fn test_lookup_without_runtime() {
        let cache = QueryCache::<u32>::with_capacity(4);
        let value = tokio_test::block_on(cache.get_or_compute("a", async { 1 }));
        assert_eq!(value, 1);
        assert_eq!(tokio_test::block_on(cache.get("a")), Some(1));
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = QueryCache::<u32>::default();
        cache.insert("a", 1).await;
        cache.invalidate_all();
        cache.run_pending_tasks().await;
        assert!(cache.get("a").await.is_none());
    }
}
