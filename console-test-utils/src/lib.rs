//! Console Test Utilities
//!
//! Shared test infrastructure for the console workspace:
//! - Proptest generators for contexts, verbs, reference types and JSON params
//! - A scriptable mock of the remote resource client
//! - Fixtures for common contexts and reference records
//! - Assertions over the console error taxonomy

pub use console_core::{
    AppContext, AppMode, ConsoleError, ConsoleResult, GrantScope, ListResponse, QueryClientConfig,
    QueryError, ReferenceError, ReferenceType, RequestError, Verb, VariableModelError,
};
pub use console_query::{CacheRead, QueryClient, QueryKey};
pub use console_reference::ResourceClient;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MOCK RESOURCE CLIENT
// ============================================================================

/// One request seen by [`MockResourceClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub api_path: String,
    pub verb: Verb,
    pub params: Value,
}

/// In-memory [`ResourceClient`].
///
/// Responses are scripted per API path; unknown paths answer with an empty
/// list. Every request is recorded, and a scripted failure makes all
/// requests fail until cleared.
#[derive(Debug, Default)]
pub struct MockResourceClient {
    responses: Mutex<HashMap<String, ListResponse<Value>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    failure: Mutex<Option<ConsoleError>>,
    calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `api_path` with `results`; the total count is their length.
    pub fn with_records(self, api_path: impl Into<String>, results: Vec<Value>) -> Self {
        let total = results.len() as u64;
        self.respond(api_path, ListResponse::new(results, Some(total)));
        self
    }

    pub fn respond(&self, api_path: impl Into<String>, response: ListResponse<Value>) {
        lock(&self.responses).insert(api_path.into(), response);
    }

    /// Fail every request with `err` until [`clear_failure`](Self::clear_failure).
    pub fn fail_with(&self, err: impl Into<ConsoleError>) {
        *lock(&self.failure) = Some(err.into());
    }

    pub fn clear_failure(&self) {
        *lock(&self.failure) = None;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests made to `api_path`.
    pub fn calls_to(&self, api_path: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|request| request.api_path == api_path)
            .count()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }
}

#[async_trait]
impl ResourceClient for MockResourceClient {
    async fn request(
        &self,
        api_path: &str,
        verb: &Verb,
        params: Value,
    ) -> ConsoleResult<ListResponse<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(RecordedRequest {
            api_path: api_path.to_string(),
            verb: verb.clone(),
            params,
        });

        if let Some(err) = lock(&self.failure).clone() {
            return Err(err);
        }
        Ok(lock(&self.responses)
            .get(api_path)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for console types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Number};

    // === Scalar Generators ===

    /// Lowercase identifier such as `project_1`.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,11}"
    }

    /// Id in the `prefix-xxxx` shape the console uses.
    pub fn arb_resource_id(prefix: &'static str) -> impl Strategy<Value = String> {
        "[0-9a-f]{4,12}".prop_map(move |suffix| format!("{}-{}", prefix, suffix))
    }

    // === Enum Generators ===

    pub fn arb_app_mode() -> impl Strategy<Value = AppMode> {
        prop_oneof![Just(AppMode::Admin), Just(AppMode::Workspace)]
    }

    pub fn arb_grant_scope() -> impl Strategy<Value = GrantScope> {
        prop_oneof![
            Just(GrantScope::System),
            Just(GrantScope::Domain),
            Just(GrantScope::Workspace),
            Just(GrantScope::User),
        ]
    }

    pub fn arb_verb() -> impl Strategy<Value = Verb> {
        prop_oneof![
            Just(Verb::Get),
            Just(Verb::List),
            Just(Verb::Stat),
            Just(Verb::Analyze),
            Just(Verb::Load),
            Just(Verb::Create),
            Just(Verb::Update),
            Just(Verb::Delete),
            "get_[a-z]{1,8}".prop_map(Verb::Other),
        ]
    }

    pub fn arb_reference_type() -> impl Strategy<Value = ReferenceType> {
        proptest::sample::select(ReferenceType::ALL.to_vec())
    }

    // === Struct Generators ===

    /// A ready context in either mode, with the mode's usual grant.
    pub fn arb_app_context() -> impl Strategy<Value = AppContext> {
        prop_oneof![
            arb_resource_id("domain").prop_map(AppContext::admin),
            (arb_resource_id("domain"), arb_resource_id("workspace"))
                .prop_map(|(domain, workspace)| AppContext::workspace(domain, workspace)),
        ]
    }

    /// Arbitrary JSON, nested up to a few levels.
    pub fn arb_json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| Value::Number(Number::from(n))),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map(arb_identifier(), inner, 0..4)
                    .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>())),
            ]
        })
    }

    /// A params object: identifier keys mapped to arbitrary JSON.
    pub fn arb_params() -> impl Strategy<Value = Value> {
        prop::collection::btree_map(arb_identifier(), arb_json_value(), 0..5)
            .prop_map(|fields| Value::Object(fields.into_iter().collect()))
    }

    /// A record of `reference_type` carrying its id and name fields.
    pub fn arb_reference_record(reference_type: ReferenceType) -> impl Strategy<Value = Value> {
        let info = console_reference::reference_type_info(reference_type);
        (arb_resource_id("id"), "[A-Za-z ]{0,16}").prop_map(move |(id, name)| {
            let mut record = Map::new();
            record.insert(info.id_key.to_string(), Value::String(id));
            record.insert(info.name_key.to_string(), Value::String(name));
            Value::Object(record)
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use serde_json::json;
    use std::time::Duration;

    pub const DOMAIN_ID: &str = "domain-1";
    pub const WORKSPACE_ID: &str = "workspace-1";

    pub fn admin_context() -> AppContext {
        AppContext::admin(DOMAIN_ID)
    }

    pub fn workspace_context() -> AppContext {
        AppContext::workspace(DOMAIN_ID, WORKSPACE_ID)
    }

    /// Short timings so staleness can be exercised in tests.
    pub fn fast_config() -> QueryClientConfig {
        QueryClientConfig::default()
            .with_stale_time(Duration::from_millis(50))
            .with_gc_time(Duration::from_millis(50))
            .with_reference_load_ttl(Duration::from_millis(50))
            .with_page_size(2)
    }

    pub fn project_records() -> Vec<Value> {
        vec![
            json!({ "project_id": "project-1", "name": "Billing", "project_group_id": "pg-1" }),
            json!({ "project_id": "project-2", "name": "Platform", "project_group_id": "pg-1" }),
            json!({ "project_id": "project-3", "name": "", "project_group_id": "pg-2" }),
        ]
    }

    pub fn project_group_records() -> Vec<Value> {
        vec![
            json!({ "project_group_id": "pg-1", "name": "Finance" }),
            json!({ "project_group_id": "pg-2", "name": "Engineering" }),
        ]
    }

    /// Kim is bound to `role-owner`; Lee has no binding.
    pub fn user_records() -> Vec<Value> {
        vec![
            json!({
                "user_id": "kim@example.com",
                "name": "Kim",
                "role_binding_info": { "role_id": "role-owner" }
            }),
            json!({ "user_id": "lee@example.com", "name": "" }),
        ]
    }

    pub fn role_records() -> Vec<Value> {
        vec![json!({ "role_id": "role-owner", "name": "Workspace Owner", "role_type": "WORKSPACE_OWNER" })]
    }

    pub fn workspace_records() -> Vec<Value> {
        vec![
            json!({ "workspace_id": WORKSPACE_ID, "name": "Production", "state": "ENABLED" }),
            json!({ "workspace_id": "workspace-2", "name": "Staging", "state": "ENABLED" }),
        ]
    }

    /// A mock client answering the common reference endpoints of both modes.
    pub fn seeded_resource_client() -> MockResourceClient {
        MockResourceClient::new()
            .with_records("identity.project", project_records())
            .with_records("identity.project_group", project_group_records())
            .with_records("identity.role", role_records())
            .with_records("identity.user", user_records())
            .with_records("identity.workspace_user", user_records())
            .with_records("identity.workspace", workspace_records())
            .with_records("identity.user_profile", workspace_records())
    }

    /// `count` list records of one page-able resource, ids `item-1..`.
    pub fn numbered_records(count: usize) -> Vec<Value> {
        (1..=count)
            .map(|i| json!({ "id": format!("item-{}", i), "name": format!("Item {}", i) }))
            .collect()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over console results and keys.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &ConsoleResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &ConsoleResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    #[track_caller]
    pub fn assert_query_error<T: std::fmt::Debug>(result: &ConsoleResult<T>) {
        match result {
            Err(ConsoleError::Query(_)) => {}
            other => panic!("Expected Query error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_request_error<T: std::fmt::Debug>(result: &ConsoleResult<T>) {
        match result {
            Err(ConsoleError::Request(_)) => {}
            other => panic!("Expected Request error, got: {:?}", other),
        }
    }

    /// Assert an `UnregisteredResource` error naming `name`.
    #[track_caller]
    pub fn assert_unregistered<T: std::fmt::Debug>(result: &ConsoleResult<T>, name: &str) {
        match result {
            Err(ConsoleError::Reference(ReferenceError::UnregisteredResource { name: n })) => {
                assert_eq!(n, name, "Wrong name in UnregisteredResource error");
            }
            other => panic!("Expected UnregisteredResource({}), got: {:?}", name, other),
        }
    }

    #[track_caller]
    pub fn assert_variable_model_error<T: std::fmt::Debug>(
        result: &ConsoleResult<T>,
        expected: &VariableModelError,
    ) {
        match result {
            Err(ConsoleError::VariableModel(err)) => assert_eq!(err, expected),
            other => panic!("Expected {:?}, got: {:?}", expected, other),
        }
    }

    #[track_caller]
    pub fn assert_key_starts_with(key: &QueryKey, prefix: &QueryKey) {
        assert!(
            key.starts_with(prefix),
            "Expected {} to start with {}",
            key,
            prefix
        );
    }

    #[track_caller]
    pub fn assert_cache_hit<T>(read: &CacheRead<T>) {
        assert!(read.was_cache_hit(), "Expected a cache hit");
    }

    #[track_caller]
    pub fn assert_cache_miss<T>(read: &CacheRead<T>) {
        assert!(read.was_cache_miss(), "Expected a cache miss");
    }
}

// ============================================================================
// TESTS
// ============================================================================
