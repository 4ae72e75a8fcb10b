//! Grant-scope gated queries.
//!
//! A [`ScopedQuery`] runs only when the caller enables it, the current grant
//! scope is one the query declares, and the app has finished resolving the
//! grant. Otherwise it reports [`QueryOutcome::Disabled`] without touching
//! the fetcher.

use console_core::{AppContext, ConsoleResult, GrantScope, QueryError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use tracing::warn;

use crate::cache::{CacheRead, Freshness, QueryClient};
use crate::key::QueryKey;

/// Result of a gated read.
#[derive(Debug, Clone)]
pub enum QueryOutcome<T> {
    /// The query was not allowed to run.
    Disabled,
    Ready(CacheRead<T>),
}

impl<T> QueryOutcome<T> {
    pub fn is_disabled(&self) -> bool {
        matches!(self, QueryOutcome::Disabled)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            QueryOutcome::Ready(read) => Some(read.value()),
            QueryOutcome::Disabled => None,
        }
    }

    pub fn into_read(self) -> Option<CacheRead<T>> {
        match self {
            QueryOutcome::Ready(read) => Some(read),
            QueryOutcome::Disabled => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        self.into_read().map(CacheRead::into_value)
    }
}

/// A query bound to the grant scopes allowed to run it.
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    key: QueryKey,
    required_scopes: Vec<GrantScope>,
    enabled: bool,
    freshness: Option<Freshness>,
}

impl ScopedQuery {
    /// Every scoped query must name at least one scope.
    pub fn new(key: QueryKey, required_scopes: &[GrantScope]) -> ConsoleResult<Self> {
        if required_scopes.is_empty() {
            warn!(
                key = %key,
                "scoped query declares no required scopes; pass at least one such as DOMAIN or WORKSPACE"
            );
            return Err(QueryError::MissingRequiredScopes {
                key: key.to_string(),
            }
            .into());
        }
        Ok(Self {
            key,
            required_scopes: required_scopes.to_vec(),
            enabled: true,
            freshness: None,
        })
    }

    /// Caller-side switch, ANDed with the scope checks.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Freshness for reads. Defaults to the client's stale time.
    pub fn freshness(mut self, freshness: Freshness) -> Self {
        self.freshness = Some(freshness);
        self
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The configured freshness, or the client's default stale time.
    pub fn effective_freshness(&self, client: &QueryClient) -> Freshness {
        self.freshness
            .clone()
            .unwrap_or_else(|| Freshness::best_effort(client.config().default_stale_time))
    }

    pub fn required_scopes(&self) -> &[GrantScope] {
        &self.required_scopes
    }

    pub fn has_valid_scope(&self, ctx: &AppContext) -> bool {
        ctx.grant_scope
            .is_some_and(|scope| self.required_scopes.contains(&scope))
    }

    pub fn is_enabled(&self, ctx: &AppContext) -> bool {
        self.enabled && self.has_valid_scope(ctx) && ctx.is_ready()
    }

    /// Run the query through `client` if it is enabled under `ctx`.
    pub async fn fetch<T, F, Fut>(
        &self,
        client: &QueryClient,
        ctx: &AppContext,
        fetch: F,
    ) -> ConsoleResult<QueryOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConsoleResult<T>>,
    {
        if !self.is_enabled(ctx) {
            self.warn_on_scope_mismatch(ctx);
            return Ok(QueryOutcome::Disabled);
        }

        let freshness = self.effective_freshness(client);
        let read = client.fetch_query(&self.key, freshness, fetch).await?;
        Ok(QueryOutcome::Ready(read))
    }

    /// An enabled query on a ready app whose scope is not allowed usually
    /// means the query was declared with the wrong scopes.
    fn warn_on_scope_mismatch(&self, ctx: &AppContext) {
        if let Some(current) = ctx.grant_scope {
            if self.enabled && ctx.is_ready() && !self.required_scopes.contains(&current) {
                warn!(
                    key = %self.key,
                    required_scopes = ?self.required_scopes,
                    current_scope = %current,
                    "invalid required scopes for current scope"
                );
            }
        }
    }
}
