//! Pagination helpers and paginated scoped queries.
//!
//! Where page info lives in request params depends on the verb:
//!
//! - `load`: top-level `page: {start, limit}`
//! - `list`, `stat`, `analyze`: `query.page: {start, limit}`
//!
//! Paginated keys never include the page itself, so every page of one
//! listing is cached together under a single key.

use console_core::{AppContext, ConsoleResult, ListResponse, QueryClientConfig, QueryError, Verb};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use tracing::debug;

use crate::cache::{CacheRead, QueryClient};
use crate::key::QueryKey;
use crate::scoped::{QueryOutcome, ScopedQuery};

/// 1-based start offset and page length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub start: u64,
    pub limit: u64,
}

impl PageParams {
    pub fn new(start: u64, limit: u64) -> Self {
        Self { start, limit }
    }

    fn to_json(self) -> Value {
        let mut page = Map::new();
        page.insert("start".to_string(), Value::from(self.start));
        page.insert("limit".to_string(), Value::from(self.limit));
        Value::Object(page)
    }
}

/// Drop the top-level `page` field.
pub fn omit_page_from_load_params(mut params: Value) -> Value {
    if let Some(obj) = params.as_object_mut() {
        obj.remove("page");
    }
    params
}

/// Drop `query.page`, keeping the rest of `query`.
pub fn omit_page_query_params(mut params: Value) -> Value {
    if let Some(query) = params.get_mut("query").and_then(Value::as_object_mut) {
        query.remove("page");
    }
    params
}

pub fn omit_page_params_by_verb(verb: &Verb, params: Value) -> Value {
    if verb.uses_top_level_page() {
        omit_page_from_load_params(params)
    } else if verb.uses_query_page() {
        omit_page_query_params(params)
    } else {
        params
    }
}

/// Insert `page` where `verb` expects it. Other verbs are returned as is.
pub fn add_page_to_verb_params(verb: &Verb, params: Value, page: PageParams) -> Value {
    if !(verb.uses_top_level_page() || verb.uses_query_page()) {
        return params;
    }

    let mut root = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return other,
    };

    if verb.uses_top_level_page() {
        root.insert("page".to_string(), page.to_json());
    } else {
        let query = root
            .entry("query".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !query.is_object() {
            *query = Value::Object(Map::new());
        }
        if let Some(query) = query.as_object_mut() {
            query.insert("page".to_string(), page.to_json());
        }
    }
    Value::Object(root)
}

/// A page of a paginated listing.
pub trait PageData {
    /// Number of results in this page.
    fn result_count(&self) -> usize;
    /// Total results across all pages, as reported by the server.
    fn total_count(&self) -> Option<u64>;
}

impl<T> PageData for ListResponse<T> {
    fn result_count(&self) -> usize {
        self.results.len()
    }

    fn total_count(&self) -> Option<u64> {
        self.total_count
    }
}

/// Start offset of the page after `pages`, or `None` once every result
/// reported by the last page's `total_count` has been loaded.
///
/// Starts are 1-based result offsets, so after loading 15 results the next
/// page starts at 16. With no pages loaded there is nothing to continue
/// from and the caller's initial start applies.
pub fn next_page_param<P: PageData>(pages: &[P]) -> Option<u64> {
    let last = pages.last()?;
    let loaded: u64 = pages.iter().map(|page| page.result_count() as u64).sum();
    let total = last.total_count().unwrap_or(0);
    (loaded < total).then_some(loaded + 1)
}

/// A scoped listing whose pages are fetched on demand and cached together.
#[derive(Debug, Clone)]
pub struct ScopedPaginationQuery {
    query: ScopedQuery,
    verb: Verb,
    params: Value,
    page_size: u64,
    initial_page_param: u64,
}

impl ScopedPaginationQuery {
    /// `params` are the base request params without page info.
    pub fn new(query: ScopedQuery, verb: Verb, params: Value, page_size: u64) -> Self {
        Self {
            query,
            verb,
            params,
            page_size,
            initial_page_param: 1,
        }
    }

    /// Like [`new`](Self::new) with the configured page size.
    pub fn from_config(
        query: ScopedQuery,
        verb: Verb,
        params: Value,
        config: &QueryClientConfig,
    ) -> Self {
        Self::new(query, verb, params, config.page_size as u64)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn with_initial_page_param(mut self, start: u64) -> Self {
        self.initial_page_param = start;
        self
    }

    pub fn key(&self) -> &QueryKey {
        self.query.key()
    }

    /// Request params for the page starting at `start`.
    pub fn page_params(&self, start: u64) -> Value {
        add_page_to_verb_params(
            &self.verb,
            self.params.clone(),
            PageParams::new(start, self.page_size),
        )
    }

    /// Make sure pages `1..=this_page` are loaded, fetching the missing ones
    /// in order.
    ///
    /// Stops early when the server reports no further results. Page sets
    /// that are invalidated or older than the query's freshness allows are
    /// discarded and reloaded from the first page.
    pub async fn ensure_page<T, F, Fut>(
        &self,
        client: &QueryClient,
        ctx: &AppContext,
        this_page: usize,
        fetch: F,
    ) -> ConsoleResult<QueryOutcome<Vec<ListResponse<T>>>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Value) -> Fut,
        Fut: Future<Output = ConsoleResult<ListResponse<T>>>,
    {
        if this_page == 0 {
            return Err(QueryError::InvalidPage { page: this_page }.into());
        }
        if !self.query.is_enabled(ctx) {
            return Ok(QueryOutcome::Disabled);
        }

        let key = self.query.key();
        let freshness = self.query.effective_freshness(client);
        let meta = client
            .query_meta(key)
            .await
            .filter(|meta| meta.satisfies(&freshness));
        let mut pages: Vec<ListResponse<T>> = match meta {
            Some(_) => client.get_query_data(key).await?.unwrap_or_default(),
            None => Vec::new(),
        };

        let mut fetched = 0usize;
        while pages.len() < this_page {
            let start = if pages.is_empty() {
                self.initial_page_param
            } else {
                match next_page_param(&pages) {
                    Some(start) => start,
                    None => break,
                }
            };
            debug!(key = %key, start, limit = self.page_size, "fetching page");
            pages.push(fetch(self.page_params(start)).await?);
            fetched += 1;
        }

        if fetched > 0 {
            let watermark = client.set_query_data(key, &pages).await?;
            return Ok(QueryOutcome::Ready(CacheRead::from_fetch(pages, watermark)));
        }
        let read = match meta {
            Some(meta) => CacheRead::from_cache(pages, meta.updated_at, meta.watermark),
            None => CacheRead::from_fetch(pages, client.current_watermark().await),
        };
        Ok(QueryOutcome::Ready(read))
    }

    /// Loaded pages, first page first. Empty when nothing is cached.
    pub async fn pages<T: DeserializeOwned>(
        &self,
        client: &QueryClient,
    ) -> ConsoleResult<Vec<ListResponse<T>>> {
        Ok(client.get_query_data(self.key()).await?.unwrap_or_default())
    }

    /// Page `this_page` (1-based) if it has been loaded.
    pub async fn page<T: DeserializeOwned>(
        &self,
        client: &QueryClient,
        this_page: usize,
    ) -> ConsoleResult<Option<ListResponse<T>>> {
        if this_page == 0 {
            return Ok(None);
        }
        let mut pages = self.pages::<T>(client).await?;
        if pages.len() < this_page {
            return Ok(None);
        }
        Ok(Some(pages.swap_remove(this_page - 1)))
    }

    /// Total reported by the first page, 0 before anything is loaded.
    pub async fn total_count(&self, client: &QueryClient) -> ConsoleResult<u64> {
        let pages = self.pages::<Value>(client).await?;
        Ok(pages
            .first()
            .and_then(|page| page.total_count)
            .unwrap_or(0))
    }

    pub async fn is_ready(&self, client: &QueryClient, this_page: usize) -> ConsoleResult<bool> {
        Ok(self.page::<Value>(client, this_page).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Freshness;
    use crate::key::ServiceQueryKey;
    use console_core::GrantScope;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_omit_by_verb() {
        let load = json!({"page": {"start": 1, "limit": 15}, "granularity": "DAILY"});
        assert_eq!(
            omit_page_params_by_verb(&Verb::Load, load),
            json!({"granularity": "DAILY"})
        );

        let list = json!({"query": {"page": {"start": 1, "limit": 15}, "only": ["id"]}});
        assert_eq!(
            omit_page_params_by_verb(&Verb::List, list),
            json!({"query": {"only": ["id"]}})
        );

        let get = json!({"page": 1});
        assert_eq!(omit_page_params_by_verb(&Verb::Get, get.clone()), get);
    }

    #[test]
    fn test_omit_tolerates_missing_fields() {
        assert_eq!(omit_page_query_params(json!({})), json!({}));
        assert_eq!(omit_page_query_params(Value::Null), Value::Null);
        assert_eq!(omit_page_from_load_params(json!([1])), json!([1]));
    }

    #[test]
    fn test_add_page_by_verb() {
        let page = PageParams::new(16, 15);

        assert_eq!(
            add_page_to_verb_params(&Verb::Load, json!({"sort": "name"}), page),
            json!({"sort": "name", "page": {"start": 16, "limit": 15}})
        );
        assert_eq!(
            add_page_to_verb_params(&Verb::Stat, json!({"query": {"distinct": "name"}}), page),
            json!({"query": {"distinct": "name", "page": {"start": 16, "limit": 15}}})
        );
        assert_eq!(
            add_page_to_verb_params(&Verb::List, Value::Null, page),
            json!({"query": {"page": {"start": 16, "limit": 15}}})
        );
        assert_eq!(
            add_page_to_verb_params(&Verb::Get, json!({"id": "x"}), page),
            json!({"id": "x"})
        );
    }

    #[test]
    fn test_add_then_omit_restores_params() {
        let base = json!({"query": {"filter": [{"k": "state", "v": "ENABLED", "o": "eq"}]}});
        let paged = add_page_to_verb_params(&Verb::List, base.clone(), PageParams::new(1, 15));
        assert_eq!(omit_page_params_by_verb(&Verb::List, paged), base);
    }

    #[test]
    fn test_next_page_param() {
        let empty: Vec<ListResponse<u64>> = Vec::new();
        assert_eq!(next_page_param(&empty), None);

        let first = ListResponse::new(vec![1, 2, 3], Some(7));
        assert_eq!(next_page_param(&[first.clone()]), Some(4));

        let second = ListResponse::new(vec![4, 5, 6], Some(7));
        let third = ListResponse::new(vec![7], Some(7));
        assert_eq!(next_page_param(&[first, second, third]), None);

        let unknown_total = ListResponse::new(vec![1], None);
        assert_eq!(next_page_param(&[unknown_total]), None);
    }

    fn paginated(ctx: &AppContext) -> ScopedPaginationQuery {
        let key = ServiceQueryKey::builder(ctx, "identity", "project", Verb::List)
            .params(json!({"query": {"only": ["project_id", "name"]}}))
            .pagination(true)
            .build();
        let query = ScopedQuery::new(key.key().clone(), &[GrantScope::Workspace]).unwrap();
        ScopedPaginationQuery::new(query, Verb::List, json!({"query": {"only": ["project_id", "name"]}}), 2)
    }

    async fn fake_page(calls: Arc<AtomicUsize>, params: Value) -> ConsoleResult<ListResponse<u64>> {
        calls.fetch_add(1, Ordering::SeqCst);
        let start = params["query"]["page"]["start"].as_u64().unwrap_or(1);
        let limit = params["query"]["page"]["limit"].as_u64().unwrap_or(2);
        let total = 5u64;
        let results = (start..start + limit).filter(|n| *n <= total).collect();
        Ok(ListResponse::new(results, Some(total)))
    }

    #[tokio::test]
    async fn test_ensure_page_fetches_missing_pages() {
        let ctx = AppContext::workspace("domain-1", "ws-1");
        let client = QueryClient::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = paginated(&ctx);

        let outcome = query
            .ensure_page(&client, &ctx, 2, |params| fake_page(calls.clone(), params))
            .await
            .unwrap();
        let pages = outcome.into_value().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].results, vec![3, 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Already loaded: no new calls.
        query
            .ensure_page(&client, &ctx, 1, |params| fake_page(calls.clone(), params))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Only the third page is missing; a fourth does not exist.
        let outcome = query
            .ensure_page(&client, &ctx, 4, |params| fake_page(calls.clone(), params))
            .await
            .unwrap();
        assert_eq!(outcome.value().map(Vec::len), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert_eq!(query.total_count(&client).await.unwrap(), 5);
        assert!(query.is_ready(&client, 3).await.unwrap());
        assert!(!query.is_ready(&client, 4).await.unwrap());
        let third: ListResponse<u64> = query.page(&client, 3).await.unwrap().unwrap();
        assert_eq!(third.results, vec![5]);
    }

    #[tokio::test]
    async fn test_invalidated_pages_reload_from_start() {
        let ctx = AppContext::workspace("domain-1", "ws-1");
        let client = QueryClient::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = paginated(&ctx);

        query
            .ensure_page(&client, &ctx, 2, |params| fake_page(calls.clone(), params))
            .await
            .unwrap();
        client.invalidate_prefix(query.key()).await;

        let outcome = query
            .ensure_page(&client, &ctx, 1, |params| fake_page(calls.clone(), params))
            .await
            .unwrap();
        let read = outcome.into_read().unwrap();
        assert!(read.was_cache_miss());
        assert_eq!(read.value().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stale_pages_reload_from_start() {
        let ctx = AppContext::workspace("domain-1", "ws-1");
        let client = QueryClient::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let base = paginated(&ctx);
        let scoped = ScopedQuery::new(base.key().clone(), &[GrantScope::Workspace])
            .unwrap()
            .freshness(Freshness::always_refetch());
        let query = ScopedPaginationQuery::new(scoped, Verb::List, json!({}), 2);

        for _ in 0..2 {
            let read = query
                .ensure_page(&client, &ctx, 1, |params| fake_page(calls.clone(), params))
                .await
                .unwrap()
                .into_read()
                .unwrap();
            assert!(read.was_cache_miss());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fresh_pages_are_reused_within_stale_time() {
        let ctx = AppContext::workspace("domain-1", "ws-1");
        let client = QueryClient::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = paginated(&ctx);

        query
            .ensure_page(&client, &ctx, 1, |params| fake_page(calls.clone(), params))
            .await
            .unwrap();
        let read = query
            .ensure_page(&client, &ctx, 1, |params| fake_page(calls.clone(), params))
            .await
            .unwrap()
            .into_read()
            .unwrap();
        assert!(read.was_cache_hit());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config_uses_configured_page_size() {
        let ctx = AppContext::workspace("domain-1", "ws-1");
        let scoped = ScopedQuery::new(paginated(&ctx).key().clone(), &[GrantScope::Workspace]).unwrap();
        let config = QueryClientConfig::new().with_page_size(40);
        let query = ScopedPaginationQuery::from_config(scoped, Verb::List, json!({}), &config);

        assert_eq!(query.page_size(), 40);
        assert_eq!(query.page_params(41), json!({"query": {"page": {"start": 41, "limit": 40}}}));
    }

    #[tokio::test]
    async fn test_ensure_page_gated_and_validated() {
        let ctx = AppContext::workspace("domain-1", "ws-1");
        let client = QueryClient::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = paginated(&ctx);

        let err = query
            .ensure_page(&client, &ctx, 0, |params| fake_page(calls.clone(), params))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            console_core::ConsoleError::Query(QueryError::InvalidPage { page: 0 })
        ));

        let admin = AppContext::admin("domain-1");
        let outcome = query
            .ensure_page(&client, &admin, 1, |params| fake_page(calls.clone(), params))
            .await
            .unwrap();
        assert!(outcome.is_disabled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
