//! In-memory query client.
//!
//! Entries are stored as JSON values keyed by [`QueryKey`]. Reads route on a
//! [`Freshness`] contract, fetches of the same key are serialized, and
//! invalidation marks entries stale without dropping them so callers that
//! only need the last known data can still read it.

use chrono::Utc;
use console_core::{ConsoleResult, QueryClientConfig, QueryError, Timestamp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::freshness::{CacheRead, Freshness};
use super::stats::CacheStats;
use super::watermark::Watermark;
use crate::key::QueryKey;

#[derive(Debug, Clone)]
struct QueryEntry {
    data: Value,
    updated_at: Timestamp,
    last_accessed: Timestamp,
    invalidated: bool,
    watermark: Watermark,
}

impl QueryEntry {
    fn new(data: Value, watermark: Watermark) -> Self {
        let now = Utc::now();
        Self {
            data,
            updated_at: now,
            last_accessed: now,
            invalidated: false,
            watermark,
        }
    }

    fn age(&self, now: Timestamp) -> Duration {
        (now - self.updated_at).to_std().unwrap_or(Duration::ZERO)
    }

    fn idle(&self, now: Timestamp) -> Duration {
        (now - self.last_accessed).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Bookkeeping for one cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryMeta {
    pub updated_at: Timestamp,
    pub watermark: Watermark,
    pub invalidated: bool,
}

impl QueryMeta {
    /// Whether the entry may be served under `freshness`.
    pub fn satisfies(&self, freshness: &Freshness) -> bool {
        let age = (Utc::now() - self.updated_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        freshness.accepts(age, self.invalidated)
    }
}

#[derive(Debug, Default)]
struct QueryStore {
    entries: HashMap<QueryKey, QueryEntry>,
    /// Keys with a fetch running, and whether an invalidation matched them
    /// since the fetch started.
    fetching: HashMap<QueryKey, bool>,
    /// Bumped once per invalidation round that matched anything.
    sequence: u64,
    stats: CacheStats,
}

#[derive(Debug)]
struct ClientInner {
    store: RwLock<QueryStore>,
    /// Per-key fetch locks; present only while a fetch is queued or running.
    in_flight: Mutex<HashMap<QueryKey, Arc<Mutex<()>>>>,
    config: QueryClientConfig,
}

/// Shared handle to the query cache. Clones refer to the same cache.
///
/// # Example
///
/// ```ignore
/// let client = QueryClient::new(QueryClientConfig::from_env());
/// let read = client
///     .fetch_query(&key, Freshness::best_effort(Duration::from_secs(60)), || async {
///         api.list("identity.project", params).await
///     })
///     .await?;
/// if read.was_cache_miss() {
///     tracing::debug!("loaded projects");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct QueryClient {
    inner: Arc<ClientInner>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl QueryClient {
    pub fn new(config: QueryClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                store: RwLock::new(QueryStore::default()),
                in_flight: Mutex::new(HashMap::new()),
                config,
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(QueryClientConfig::default())
    }

    pub fn config(&self) -> &QueryClientConfig {
        &self.inner.config
    }

    /// Read `key`, running `fetch` when the cached entry does not satisfy
    /// `freshness`.
    ///
    /// Concurrent calls for one key queue behind a single fetch; once it
    /// stores its result the queued callers re-check the cache before
    /// fetching themselves. Failed fetches leave the cache untouched.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: &QueryKey,
        freshness: Freshness,
        fetch: F,
    ) -> ConsoleResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConsoleResult<T>>,
    {
        if let Some(read) = self.read_fresh(key, &freshness).await? {
            debug!(key = %key, "query cache hit");
            return Ok(read);
        }

        let lock = self.fetch_lock(key).await;
        let result = {
            let _guard = lock.lock().await;
            self.fetch_locked(key, &freshness, fetch).await
        };
        self.release_fetch_lock(key, &lock).await;
        result
    }

    /// [`fetch_query`](Self::fetch_query) with the configured default stale time.
    pub async fn fetch_query_default<T, F, Fut>(
        &self,
        key: &QueryKey,
        fetch: F,
    ) -> ConsoleResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConsoleResult<T>>,
    {
        let freshness = Freshness::best_effort(self.inner.config.default_stale_time);
        self.fetch_query(key, freshness, fetch).await
    }

    async fn fetch_locked<T, F, Fut>(
        &self,
        key: &QueryKey,
        freshness: &Freshness,
        fetch: F,
    ) -> ConsoleResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConsoleResult<T>>,
    {
        // Filled by whoever held the lock before us.
        if let Some(read) = self.read_fresh(key, freshness).await? {
            return Ok(read);
        }

        {
            let mut store = self.inner.store.write().await;
            store.stats.misses += 1;
            store.fetching.insert(key.clone(), false);
        }
        debug!(key = %key, "fetching query");

        let fetched = fetch().await;
        let mut store = self.inner.store.write().await;
        let invalidated = store.fetching.remove(key).unwrap_or(false);
        let value = match fetched {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %key, error = %err, "query fetch failed");
                return Err(err);
            }
        };
        let data = encode(key, &value)?;

        // Data read before a mutation must not satisfy later reads.
        let watermark = Watermark::new(store.sequence);
        let mut entry = QueryEntry::new(data, watermark);
        entry.invalidated = invalidated;
        store.entries.insert(key.clone(), entry);
        drop(store);

        if invalidated {
            debug!(key = %key, "query invalidated while fetching; stored as stale");
        }
        Ok(CacheRead::from_fetch(value, watermark))
    }

    async fn read_fresh<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
        freshness: &Freshness,
    ) -> ConsoleResult<Option<CacheRead<T>>> {
        let mut guard = self.inner.store.write().await;
        let store = &mut *guard;
        let now = Utc::now();

        let Some(entry) = store.entries.get_mut(key) else {
            return Ok(None);
        };
        if !freshness.accepts(entry.age(now), entry.invalidated) {
            return Ok(None);
        }

        entry.last_accessed = now;
        let value = decode(key, &entry.data)?;
        store.stats.hits += 1;
        Ok(Some(CacheRead::from_cache(
            value,
            entry.updated_at,
            entry.watermark,
        )))
    }

    async fn store_entry(&self, key: &QueryKey, data: Value) -> Watermark {
        let mut store = self.inner.store.write().await;
        let watermark = Watermark::new(store.sequence);
        store
            .entries
            .insert(key.clone(), QueryEntry::new(data, watermark));
        watermark
    }

    async fn fetch_lock(&self, key: &QueryKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.inner.in_flight.lock().await;
        in_flight.entry(key.clone()).or_default().clone()
    }

    async fn release_fetch_lock(&self, key: &QueryKey, lock: &Arc<Mutex<()>>) {
        let mut in_flight = self.inner.in_flight.lock().await;
        // Only the map and this caller still hold it.
        if Arc::strong_count(lock) <= 2 {
            in_flight.remove(key);
        }
    }

    /// Last stored data for `key`, stale or not.
    pub async fn get_query_data<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
    ) -> ConsoleResult<Option<T>> {
        let mut store = self.inner.store.write().await;
        match store.entries.get_mut(key) {
            Some(entry) => {
                entry.last_accessed = Utc::now();
                decode(key, &entry.data).map(Some)
            }
            None => Ok(None),
        }
    }

    pub async fn query_meta(&self, key: &QueryKey) -> Option<QueryMeta> {
        let store = self.inner.store.read().await;
        store.entries.get(key).map(|entry| QueryMeta {
            updated_at: entry.updated_at,
            watermark: entry.watermark,
            invalidated: entry.invalidated,
        })
    }

    pub async fn is_invalidated(&self, key: &QueryKey) -> bool {
        self.query_meta(key)
            .await
            .is_some_and(|meta| meta.invalidated)
    }

    /// Store `value` under `key` as freshly fetched data.
    pub async fn set_query_data<T: Serialize>(
        &self,
        key: &QueryKey,
        value: &T,
    ) -> ConsoleResult<Watermark> {
        let data = encode(key, value)?;
        Ok(self.store_entry(key, data).await)
    }

    /// Replace the data under `key` with `f(current)`.
    ///
    /// Runs under the store's write lock, so concurrent updates of one key
    /// never lose each other's changes.
    pub async fn update_query_data<T, F>(&self, key: &QueryKey, f: F) -> ConsoleResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        let mut store = self.inner.store.write().await;
        let current = match store.entries.get(key) {
            Some(entry) => Some(decode(key, &entry.data)?),
            None => None,
        };
        let next = f(current);
        let data = encode(key, &next)?;
        let watermark = Watermark::new(store.sequence);
        store
            .entries
            .insert(key.clone(), QueryEntry::new(data, watermark));
        Ok(next)
    }

    /// Mark every entry whose key matches `predicate` as stale.
    ///
    /// Returns the number of matched entries. Invalidated entries keep their
    /// data for [`get_query_data`](Self::get_query_data) but are never served
    /// by [`fetch_query`](Self::fetch_query). A fetch of a matching key that
    /// is still running stores its result already invalidated.
    pub async fn invalidate_queries<P>(&self, predicate: P) -> u64
    where
        P: Fn(&QueryKey) -> bool,
    {
        let mut guard = self.inner.store.write().await;
        let store = &mut *guard;

        let mut matched = 0u64;
        for (key, entry) in store.entries.iter_mut() {
            if predicate(key) {
                entry.invalidated = true;
                matched += 1;
            }
        }
        let mut interrupted = false;
        for (key, invalidated) in store.fetching.iter_mut() {
            if predicate(key) {
                *invalidated = true;
                interrupted = true;
            }
        }

        if matched > 0 || interrupted {
            store.sequence += 1;
            store.stats.invalidations += matched;
        }
        debug!(matched, sequence = store.sequence, "invalidated queries");
        matched
    }

    /// Invalidate every key starting with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &QueryKey) -> u64 {
        self.invalidate_queries(|key| key.starts_with(prefix)).await
    }

    /// Drop every entry whose key matches `predicate`.
    pub async fn remove_queries<P>(&self, predicate: P) -> u64
    where
        P: Fn(&QueryKey) -> bool,
    {
        let mut store = self.inner.store.write().await;
        let before = store.entries.len();
        store.entries.retain(|key, _| !predicate(key));
        let removed = (before - store.entries.len()) as u64;
        store.stats.evictions += removed;
        removed
    }

    /// Drop entries nobody has read for `gc_time`.
    pub async fn gc(&self) -> u64 {
        let gc_time = self.inner.config.gc_time;
        let now = Utc::now();
        let mut store = self.inner.store.write().await;
        let before = store.entries.len();
        store.entries.retain(|_, entry| entry.idle(now) < gc_time);
        let removed = (before - store.entries.len()) as u64;
        store.stats.evictions += removed;
        if removed > 0 {
            debug!(removed, "garbage collected idle queries");
        }
        removed
    }

    pub async fn clear(&self) {
        self.inner.store.write().await.entries.clear();
    }

    pub async fn keys(&self) -> Vec<QueryKey> {
        self.inner.store.read().await.entries.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.store.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn current_watermark(&self) -> Watermark {
        Watermark::new(self.inner.store.read().await.sequence)
    }

    pub async fn stats(&self) -> CacheStats {
        let store = self.inner.store.read().await;
        CacheStats {
            entry_count: store.entries.len() as u64,
            ..store.stats.clone()
        }
    }
}

fn encode<T: Serialize>(key: &QueryKey, value: &T) -> ConsoleResult<Value> {
    serde_json::to_value(value).map_err(|e| {
        QueryError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn decode<T: DeserializeOwned>(key: &QueryKey, data: &Value) -> ConsoleResult<T> {
    serde_json::from_value(data.clone()).map_err(|e| {
        QueryError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{service_prefix, KeySegment};
    use console_core::{AppContext, ConsoleError, RequestError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(resource: &str) -> QueryKey {
        let ctx = AppContext::workspace("domain-1", "ws-1");
        service_prefix(&ctx).with_segments([
            KeySegment::text("identity"),
            KeySegment::text(resource),
            KeySegment::text("list"),
        ])
    }

    async fn load(calls: Arc<AtomicUsize>, value: &'static str) -> ConsoleResult<Vec<String>> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![value.to_string()])
    }

    #[tokio::test]
    async fn test_fetch_then_hit() {
        let client = QueryClient::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = key("project");

        let first = client
            .fetch_query(&key, Freshness::Consistent, || load(calls.clone(), "a"))
            .await
            .unwrap();
        assert!(first.was_cache_miss());

        let second = client
            .fetch_query(&key, Freshness::Consistent, || load(calls.clone(), "b"))
            .await
            .unwrap();
        assert!(second.was_cache_hit());
        assert_eq!(second.into_value(), vec!["a".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = client.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_zero_staleness_refetches() {
        let client = QueryClient::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = key("project");

        for _ in 0..3 {
            client
                .fetch_query(&key, Freshness::always_refetch(), || load(calls.clone(), "a"))
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidation_forces_refetch() {
        let client = QueryClient::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = key("project");

        client
            .fetch_query(&key, Freshness::Consistent, || load(calls.clone(), "a"))
            .await
            .unwrap();
        let matched = client.invalidate_prefix(&key).await;
        assert_eq!(matched, 1);
        assert!(client.is_invalidated(&key).await);

        let stale: Option<Vec<String>> = client.get_query_data(&key).await.unwrap();
        assert_eq!(stale, Some(vec!["a".to_string()]));

        let read = client
            .fetch_query(&key, Freshness::Consistent, || load(calls.clone(), "b"))
            .await
            .unwrap();
        assert!(read.was_cache_miss());
        assert_eq!(read.watermark().sequence, 1);
        assert_eq!(read.into_value(), vec!["b".to_string()]);
        assert!(!client.is_invalidated(&key).await);
    }

    #[tokio::test]
    async fn test_invalidation_without_match_keeps_watermark() {
        let client = QueryClient::with_defaults();
        assert_eq!(client.invalidate_queries(|_| true).await, 0);
        assert_eq!(client.current_watermark().await.sequence, 0);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let client = QueryClient::with_defaults();
        let key = key("project");

        let err = client
            .fetch_query(&key, Freshness::Consistent, || async {
                Err::<Vec<String>, _>(ConsoleError::from(RequestError::Network {
                    reason: "offline".to_string(),
                }))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Request(RequestError::Network { .. })));
        assert!(client.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_call() {
        let client = QueryClient::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = key("project");

        let slow = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, ConsoleError>(vec!["shared".to_string()])
        };

        let (a, b) = tokio::join!(
            client.fetch_query(&key, Freshness::Consistent, || slow(calls.clone())),
            client.fetch_query(&key, Freshness::Consistent, || slow(calls.clone())),
        );
        assert_eq!(a.unwrap().into_value(), b.unwrap().into_value());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidation_during_fetch_is_not_lost() {
        let client = QueryClient::with_defaults();
        let key = key("project");
        client.set_query_data(&key, &vec!["seed".to_string()]).await.unwrap();
        client.invalidate_prefix(&key).await;

        let slow_fetch = client.fetch_query(&key, Freshness::Consistent, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ConsoleError>(vec!["fetched-before-mutation".to_string()])
        });
        let mutation = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.invalidate_prefix(&key).await
        };
        let (read, _) = tokio::join!(slow_fetch, mutation);
        assert_eq!(read.unwrap().into_value(), vec!["fetched-before-mutation".to_string()]);
        assert!(client.is_invalidated(&key).await);

        let read = client
            .fetch_query(&key, Freshness::Consistent, || async {
                Ok::<_, ConsoleError>(vec!["post-mutation".to_string()])
            })
            .await
            .unwrap();
        assert!(read.was_cache_miss());
        assert_eq!(read.into_value(), vec!["post-mutation".to_string()]);
    }

    #[tokio::test]
    async fn test_invalidation_during_first_fetch_is_not_lost() {
        let client = QueryClient::with_defaults();
        let key = key("project");

        let slow_fetch = client.fetch_query(&key, Freshness::Consistent, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ConsoleError>(1u64)
        });
        let mutation = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.invalidate_prefix(&key).await
        };
        let (read, matched) = tokio::join!(slow_fetch, mutation);
        assert_eq!(matched, 0);
        assert_eq!(read.unwrap().into_value(), 1);
        assert!(client.is_invalidated(&key).await);
        assert_eq!(client.current_watermark().await.sequence, 1);
    }

    #[tokio::test]
    async fn test_unrelated_invalidation_during_fetch_keeps_entry_fresh() {
        let client = QueryClient::with_defaults();
        let users = key("user");
        let key = key("project");

        let slow_fetch = client.fetch_query(&key, Freshness::Consistent, || async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok::<_, ConsoleError>(1u64)
        });
        let mutation = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            client.invalidate_queries(|k| k == &users).await
        };
        let _ = tokio::join!(slow_fetch, mutation);
        assert!(!client.is_invalidated(&key).await);
    }

    #[tokio::test]
    async fn test_set_and_update() {
        let client = QueryClient::with_defaults();
        let counter = key("counter");

        client.set_query_data(&counter, &1u64).await.unwrap();
        let next = client
            .update_query_data(&counter, |current: Option<u64>| current.unwrap_or(0) + 1)
            .await
            .unwrap();
        assert_eq!(next, 2);
        assert_eq!(client.get_query_data::<u64>(&counter).await.unwrap(), Some(2));

        let missing = key("missing");
        let seeded = client
            .update_query_data(&missing, |current: Option<u64>| current.unwrap_or(10))
            .await
            .unwrap();
        assert_eq!(seeded, 10);
    }

    #[tokio::test]
    async fn test_decode_mismatch_is_serialization_error() {
        let client = QueryClient::with_defaults();
        let key = key("project");
        client.set_query_data(&key, &"text").await.unwrap();

        let err = client.get_query_data::<u64>(&key).await.unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::Query(QueryError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_and_gc() {
        let client = QueryClient::new(QueryClientConfig::new().with_gc_time(Duration::ZERO));
        client.set_query_data(&key("a"), &1u64).await.unwrap();
        client.set_query_data(&key("b"), &2u64).await.unwrap();

        let a = key("a");
        assert_eq!(client.remove_queries(|k| k == &a).await, 1);
        assert_eq!(client.keys().await, vec![key("b")]);

        assert_eq!(client.gc().await, 1);
        assert!(client.is_empty().await);
        assert_eq!(client.stats().await.evictions, 2);
    }

    #[tokio::test]
    async fn test_gc_keeps_recent_entries() {
        let client = QueryClient::with_defaults();
        client.set_query_data(&key("a"), &1u64).await.unwrap();
        assert_eq!(client.gc().await, 0);
        assert_eq!(client.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_cache() {
        let client = QueryClient::with_defaults();
        let other = client.clone();
        client.set_query_data(&key("a"), &1u64).await.unwrap();
        assert_eq!(other.get_query_data::<u64>(&key("a")).await.unwrap(), Some(1));
    }
}
