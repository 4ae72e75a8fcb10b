//! Invalidation by query context.
//!
//! Keys carry their app mode and query context at fixed positions, so whole
//! families of queries can be invalidated without knowing their services or
//! reference types:
//!
//! ```ignore
//! // After switching workspaces, drop every workspace-mode service query.
//! invalidate_service_queries(&client, Some(AppMode::Workspace)).await;
//! ```

use console_core::{AppMode, QueryContextKind};
use tracing::debug;

use crate::cache::QueryClient;
use crate::key::QueryKey;

fn context_predicate(
    kind: QueryContextKind,
    mode: Option<AppMode>,
) -> impl Fn(&QueryKey) -> bool {
    move |key| {
        key.context_kind() == Some(kind) && mode.map_or(true, |mode| key.mode() == Some(mode))
    }
}

/// Matches service queries, optionally only those of one mode.
pub fn service_query_predicate(mode: Option<AppMode>) -> impl Fn(&QueryKey) -> bool {
    context_predicate(QueryContextKind::Service, mode)
}

/// Matches reference queries, optionally only those of one mode.
pub fn reference_query_predicate(mode: Option<AppMode>) -> impl Fn(&QueryKey) -> bool {
    context_predicate(QueryContextKind::Reference, mode)
}

pub async fn invalidate_service_queries(client: &QueryClient, mode: Option<AppMode>) -> u64 {
    invalidate(client, &InvalidationScope::Services { mode }).await
}

pub async fn invalidate_reference_queries(client: &QueryClient, mode: Option<AppMode>) -> u64 {
    invalidate(client, &InvalidationScope::References { mode }).await
}

/// What to invalidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    Services { mode: Option<AppMode> },
    References { mode: Option<AppMode> },
    /// Every key starting with this one.
    Prefix(QueryKey),
    All,
}

impl InvalidationScope {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            InvalidationScope::Services { mode } => service_query_predicate(*mode)(key),
            InvalidationScope::References { mode } => reference_query_predicate(*mode)(key),
            InvalidationScope::Prefix(prefix) => key.starts_with(prefix),
            InvalidationScope::All => true,
        }
    }
}

/// Invalidate every cached query `scope` matches. Returns the match count.
pub async fn invalidate(client: &QueryClient, scope: &InvalidationScope) -> u64 {
    let matched = client.invalidate_queries(|key| scope.matches(key)).await;
    debug!(scope = ?scope, matched, "invalidation requested");
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{reference_query_key, ServiceQueryKey};
    use console_core::{AppContext, ReferenceType, Verb};

    async fn seeded() -> (QueryClient, Vec<QueryKey>) {
        let client = QueryClient::with_defaults();
        let admin = AppContext::admin("domain-1");
        let workspace = AppContext::workspace("domain-1", "ws-1");

        let keys = vec![
            ServiceQueryKey::builder(&admin, "identity", "workspace", Verb::List)
                .build()
                .key()
                .clone(),
            ServiceQueryKey::builder(&workspace, "identity", "project", Verb::List)
                .build()
                .key()
                .clone(),
            reference_query_key(&admin, ReferenceType::User),
            reference_query_key(&workspace, ReferenceType::Project),
        ];
        for key in &keys {
            client.set_query_data(key, &1u64).await.unwrap();
        }
        (client, keys)
    }

    #[tokio::test]
    async fn test_workspace_service_invalidation_is_isolated() {
        let (client, keys) = seeded().await;

        let matched = invalidate_service_queries(&client, Some(AppMode::Workspace)).await;
        assert_eq!(matched, 1);

        assert!(!client.is_invalidated(&keys[0]).await);
        assert!(client.is_invalidated(&keys[1]).await);
        assert!(!client.is_invalidated(&keys[2]).await);
        assert!(!client.is_invalidated(&keys[3]).await);
    }

    #[tokio::test]
    async fn test_reference_invalidation_all_modes() {
        let (client, keys) = seeded().await;

        let matched = invalidate_reference_queries(&client, None).await;
        assert_eq!(matched, 2);
        assert!(client.is_invalidated(&keys[2]).await);
        assert!(client.is_invalidated(&keys[3]).await);
        assert!(!client.is_invalidated(&keys[0]).await);
    }

    #[tokio::test]
    async fn test_scope_variants() {
        let (client, keys) = seeded().await;

        assert_eq!(
            invalidate(&client, &InvalidationScope::Prefix(keys[1].clone())).await,
            1
        );
        assert_eq!(invalidate(&client, &InvalidationScope::All).await, 4);
    }

    #[test]
    fn test_predicates_ignore_malformed_keys() {
        let key = QueryKey::from_segments([crate::key::KeySegment::text("orphan")]);
        assert!(!service_query_predicate(None)(&key));
        assert!(!reference_query_predicate(None)(&key));
    }
}
