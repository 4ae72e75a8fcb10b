//! Reference loaders.

use async_trait::async_trait;
use console_core::{
    AppContext, AppMode, ConsoleResult, GrantScope, ReferenceMap, ReferenceType, Verb,
};
use console_query::{reference_query_key, Freshness, QueryClient};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{reference_source, ReferenceJoin, ReferenceSource};
use crate::client::ResourceClient;
use crate::join::{
    bound_role_ids, role_list_params, roles_by_id, with_project_group, with_role_info,
    ROLE_API_PATH,
};

/// Options for one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Ignore cached data and go to the server.
    pub force: bool,
}

impl LoadOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Produces the reference map of one resource type.
#[async_trait]
pub trait ReferenceFactory: Send + Sync {
    fn reference_type(&self) -> ReferenceType;

    async fn load(&self, ctx: &AppContext, options: LoadOptions) -> ConsoleResult<ReferenceMap>;
}

/// Loads references from the remote API through the shared query cache.
///
/// Loaded maps are cached under the type's reference key and reused for the
/// configured reference TTL, so every consumer in the same scope and mode
/// shares one request.
pub struct ResourceReferenceFactory {
    source: ReferenceSource,
    client: Arc<dyn ResourceClient>,
    query_client: QueryClient,
}

impl ResourceReferenceFactory {
    pub fn new(
        reference_type: ReferenceType,
        client: Arc<dyn ResourceClient>,
        query_client: QueryClient,
    ) -> Self {
        Self {
            source: reference_source(reference_type),
            client,
            query_client,
        }
    }

    pub fn source(&self) -> &ReferenceSource {
        &self.source
    }

    async fn fetch(&self, ctx: &AppContext, options: LoadOptions) -> ConsoleResult<ReferenceMap> {
        let endpoint = self.source.endpoint(ctx.mode);
        let params = self.source.load_params(ctx.mode);
        let response = self
            .client
            .request(endpoint.api_path, &endpoint.verb, params)
            .await?;
        let map = self.source.build_map(&response.results);
        debug!(
            api_path = endpoint.api_path,
            verb = %endpoint.verb,
            records = response.results.len(),
            items = map.len(),
            "loaded references"
        );

        match self.source.join {
            ReferenceJoin::None => Ok(map),
            ReferenceJoin::UserRoles => {
                let roles = self.bound_roles(ctx.mode, &response.results).await;
                Ok(map
                    .iter()
                    .map(|(_, item)| with_role_info(item.clone(), &roles))
                    .collect())
            }
            ReferenceJoin::ProjectGroups => {
                let groups = ResourceReferenceFactory::new(
                    ReferenceType::ProjectGroup,
                    Arc::clone(&self.client),
                    self.query_client.clone(),
                )
                .load(ctx, options)
                .await?;
                Ok(map
                    .iter()
                    .map(|(_, item)| with_project_group(item.clone(), &groups))
                    .collect())
            }
        }
    }

    /// Roles bound to workspace users. Admin listings carry no bindings, and
    /// a failed role lookup leaves every user without role info.
    async fn bound_roles(&self, mode: AppMode, records: &[Value]) -> HashMap<String, Value> {
        let role_ids = bound_role_ids(records);
        if mode == AppMode::Admin || role_ids.is_empty() {
            return HashMap::new();
        }
        match self
            .client
            .request(ROLE_API_PATH, &Verb::List, role_list_params(&role_ids))
            .await
        {
            Ok(response) => roles_by_id(&response.results),
            Err(err) => {
                warn!(error = %err, roles = role_ids.len(), "role lookup failed");
                HashMap::new()
            }
        }
    }
}

#[async_trait]
impl ReferenceFactory for ResourceReferenceFactory {
    fn reference_type(&self) -> ReferenceType {
        self.source.info.resource_type
    }

    async fn load(&self, ctx: &AppContext, options: LoadOptions) -> ConsoleResult<ReferenceMap> {
        // No grant yet, or a user-only grant: there is nothing to reference.
        match ctx.grant_scope {
            None | Some(GrantScope::User) => return Ok(ReferenceMap::new()),
            Some(_) => {}
        }

        let key = reference_query_key(ctx, self.reference_type());
        if options.force {
            debug!(key = %key, "forcing reference reload");
            self.query_client.invalidate_prefix(&key).await;
        }
        let freshness = Freshness::best_effort(self.query_client.config().reference_load_ttl);
        let read = self
            .query_client
            .fetch_query(&key, freshness, || self.fetch(ctx, options))
            .await?;
        Ok(read.into_value())
    }
}

/// A fixed map, for types populated locally or in tests.
pub struct StaticReferenceFactory {
    reference_type: ReferenceType,
    map: ReferenceMap,
}

impl StaticReferenceFactory {
    pub fn new(reference_type: ReferenceType, map: ReferenceMap) -> Self {
        Self {
            reference_type,
            map,
        }
    }

    /// Build from raw records using the type's field names.
    pub fn from_records(reference_type: ReferenceType, records: &[Value]) -> Self {
        let map = reference_source(reference_type).build_map(records);
        Self::new(reference_type, map)
    }
}

#[async_trait]
impl ReferenceFactory for StaticReferenceFactory {
    fn reference_type(&self) -> ReferenceType {
        self.reference_type
    }

    async fn load(&self, _ctx: &AppContext, _options: LoadOptions) -> ConsoleResult<ReferenceMap> {
        Ok(self.map.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_core::{ListResponse, RequestError};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<(String, Verb, Value)>>,
        fail: Option<&'static str>,
    }

    impl RecordingClient {
        fn failing(api_path: &'static str) -> Self {
            Self {
                fail: Some(api_path),
                ..Default::default()
            }
        }

        fn calls_to(&self, api_path: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(path, _, _)| path == api_path)
                .count()
        }
    }

    #[async_trait]
    impl ResourceClient for RecordingClient {
        async fn request(
            &self,
            api_path: &str,
            verb: &Verb,
            params: Value,
        ) -> ConsoleResult<ListResponse<Value>> {
            self.requests
                .lock()
                .unwrap()
                .push((api_path.to_string(), verb.clone(), params));
            if self.fail == Some(api_path) {
                return Err(RequestError::Network {
                    reason: "offline".to_string(),
                }
                .into());
            }
            let results = match api_path {
                "identity.project" => vec![
                    json!({ "project_id": "project-1", "name": "Billing", "project_group_id": "pg-1" }),
                    json!({ "project_id": "project-2", "name": "" }),
                ],
                "identity.project_group" => vec![json!({ "project_group_id": "pg-1", "name": "Finance" })],
                "identity.workspace_user" | "identity.user" => vec![
                    json!({ "user_id": "kim@example.com", "name": "Kim", "role_binding_info": { "role_id": "role-1" } }),
                    json!({ "user_id": "lee@example.com", "name": "Lee" }),
                ],
                "identity.role" => vec![json!({ "role_id": "role-1", "name": "Owner", "role_type": "WORKSPACE_OWNER" })],
                _ => Vec::new(),
            };
            let total = results.len() as u64;
            Ok(ListResponse::new(results, Some(total)))
        }
    }

    fn factory(reference_type: ReferenceType, client: Arc<RecordingClient>) -> ResourceReferenceFactory {
        ResourceReferenceFactory::new(reference_type, client, QueryClient::with_defaults())
    }

    #[tokio::test]
    async fn test_load_builds_map() {
        let client = Arc::new(RecordingClient::default());
        let ctx = AppContext::workspace("domain-1", "ws-1");

        let map = factory(ReferenceType::Region, client.clone())
            .load(&ctx, LoadOptions::default())
            .await
            .unwrap();
        assert!(map.is_empty());

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "inventory.region");
        assert_eq!(requests[0].1, Verb::List);
        assert_eq!(requests[0].2["query"]["only"][0], json!("region_code"));
    }

    #[tokio::test]
    async fn test_projects_join_their_group() {
        let client = Arc::new(RecordingClient::default());
        let ctx = AppContext::workspace("domain-1", "ws-1");

        let map = factory(ReferenceType::Project, client.clone())
            .load(&ctx, LoadOptions::default())
            .await
            .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.label_of("project-1"), "Finance > Billing");
        assert_eq!(
            map.get("project-1").map(|item| item.data["group_info"].clone()),
            Some(json!({ "id": "pg-1", "name": "Finance" }))
        );
        assert_eq!(map.label_of("project-2"), "project-2");
        assert_eq!(client.calls_to("identity.project_group"), 1);
    }

    #[tokio::test]
    async fn test_project_group_failure_fails_projects() {
        let client = Arc::new(RecordingClient::failing("identity.project_group"));
        let err = factory(ReferenceType::Project, client)
            .load(&AppContext::admin("domain-1"), LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, console_core::ConsoleError::Request(_)));
    }

    #[tokio::test]
    async fn test_workspace_users_join_their_role() {
        let client = Arc::new(RecordingClient::default());
        let ctx = AppContext::workspace("domain-1", "ws-1");

        let map = factory(ReferenceType::User, client.clone())
            .load(&ctx, LoadOptions::default())
            .await
            .unwrap();

        let kim = map.get("kim@example.com").unwrap();
        assert_eq!(kim.label, "kim@example.com (Kim)");
        assert_eq!(kim.data["role_info"]["name"], json!("Owner"));
        assert_eq!(map.get("lee@example.com").unwrap().data["role_info"], json!({}));

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[1].0, "identity.role");
        assert_eq!(requests[1].2["query"]["filter"][0]["v"], json!(["role-1"]));
    }

    #[tokio::test]
    async fn test_admin_users_skip_role_lookup() {
        let client = Arc::new(RecordingClient::default());
        let map = factory(ReferenceType::User, client.clone())
            .load(&AppContext::admin("domain-1"), LoadOptions::default())
            .await
            .unwrap();

        assert_eq!(map.get("kim@example.com").unwrap().data["role_info"], json!({}));
        assert_eq!(client.calls_to("identity.role"), 0);
    }

    #[tokio::test]
    async fn test_role_lookup_failure_keeps_users() {
        let client = Arc::new(RecordingClient::failing("identity.role"));
        let map = factory(ReferenceType::User, client)
            .load(&AppContext::workspace("domain-1", "ws-1"), LoadOptions::default())
            .await
            .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("kim@example.com").unwrap().data["role_info"], json!({}));
    }

    #[tokio::test]
    async fn test_load_is_cached_until_forced() {
        let client = Arc::new(RecordingClient::default());
        let factory = factory(ReferenceType::Project, client.clone());
        let ctx = AppContext::admin("domain-1");

        factory.load(&ctx, LoadOptions::default()).await.unwrap();
        factory.load(&ctx, LoadOptions::default()).await.unwrap();
        assert_eq!(client.calls_to("identity.project"), 1);
        assert_eq!(client.calls_to("identity.project_group"), 1);

        factory.load(&ctx, LoadOptions::forced()).await.unwrap();
        assert_eq!(client.calls_to("identity.project"), 2);
        assert_eq!(client.calls_to("identity.project_group"), 2);
    }

    #[tokio::test]
    async fn test_no_grant_or_user_grant_loads_nothing() {
        let client = Arc::new(RecordingClient::default());
        let factory = factory(ReferenceType::Project, client.clone());

        let no_grant = AppContext::admin("domain-1").with_grant_scope(None);
        let user = AppContext::admin("domain-1").with_grant_scope(Some(GrantScope::User));

        assert!(factory.load(&no_grant, LoadOptions::default()).await.unwrap().is_empty());
        assert!(factory.load(&user, LoadOptions::default()).await.unwrap().is_empty());
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_propagates() {
        let client = Arc::new(RecordingClient::failing("identity.project"));
        let err = factory(ReferenceType::Project, client)
            .load(&AppContext::admin("domain-1"), LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, console_core::ConsoleError::Request(_)));
    }

    #[tokio::test]
    async fn test_static_factory() {
        let factory = StaticReferenceFactory::from_records(
            ReferenceType::Provider,
            &[json!({ "provider": "aws", "name": "AWS" })],
        );
        assert_eq!(factory.reference_type(), ReferenceType::Provider);
        let map = factory
            .load(&AppContext::admin("d"), LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(map.label_of("aws"), "AWS");
    }
}
