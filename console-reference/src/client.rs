//! Remote API seam.

use async_trait::async_trait;
use console_core::{ConsoleResult, ListResponse, Verb};
use serde_json::Value;

/// The console's RPC client, reduced to what reference loading needs.
///
/// `api_path` is the dotted `service.resource` path (e.g.
/// `identity.project`); the verb selects the method on it.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn request(
        &self,
        api_path: &str,
        verb: &Verb,
        params: Value,
    ) -> ConsoleResult<ListResponse<Value>>;

    async fn list(&self, api_path: &str, params: Value) -> ConsoleResult<ListResponse<Value>> {
        self.request(api_path, &Verb::List, params).await
    }

    async fn stat(&self, api_path: &str, params: Value) -> ConsoleResult<ListResponse<Value>> {
        self.request(api_path, &Verb::Stat, params).await
    }
}
