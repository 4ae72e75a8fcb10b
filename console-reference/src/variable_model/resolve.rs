//! Resolving variable models into options.

use console_core::{ConsoleResult, VariableModelError};
use console_query::ErrorHandler;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::config::{
    resource_api_path, VariableModelConfig, VariableModelQuery, VariableModelResponse,
    VariableOption,
};
use crate::client::ResourceClient;

/// `list` params for a resource model.
///
/// Search matches `search_targets`, or the id and name fields when none are
/// configured.
pub fn resource_list_params(
    id_key: &str,
    name_key: &str,
    search_targets: &[String],
    query: &VariableModelQuery,
) -> Value {
    let mut body = Map::new();
    body.insert(
        "filter".to_string(),
        json!([{ "key": id_key, "value": [null, ""], "operator": "not_in" }]),
    );
    body.insert("only".to_string(), json!([id_key, name_key]));

    if let Some(search) = query.search_text() {
        let targets: Vec<&str> = if search_targets.is_empty() {
            vec![id_key, name_key]
        } else {
            search_targets.iter().map(String::as_str).collect()
        };
        let filter_or: Vec<Value> = targets
            .into_iter()
            .map(|k| json!({ "k": k, "v": search, "o": "contain" }))
            .collect();
        body.insert("filter_or".to_string(), Value::Array(filter_or));
    }
    if let Some((start, limit)) = query.page() {
        body.insert("page".to_string(), json!({ "start": start, "limit": limit }));
    }
    json!({ "query": Value::Object(body) })
}

/// `stat` params selecting the distinct values of `data_key`.
pub fn distinct_stat_params(data_key: &str, query: &VariableModelQuery) -> Value {
    let mut filter = vec![json!({ "key": data_key, "value": [null, ""], "operator": "not_in" })];
    if let Some(search) = query.search_text() {
        filter.push(json!({ "key": data_key, "value": search, "operator": "contain" }));
    }
    if !query.filters.is_empty() {
        filter.push(json!({ "key": data_key, "value": query.filters, "operator": "in" }));
    }

    let mut body = json!({ "filter": filter, "distinct": data_key });
    if let Some((start, limit)) = query.page() {
        body["page"] = json!({ "start": start, "limit": limit });
    }
    json!({ "query": body })
}

/// Another page exists when `start * limit < total_count`.
pub fn has_more(query: &VariableModelQuery, total_count: Option<u64>) -> bool {
    match (query.page(), total_count) {
        (Some((start, limit)), Some(total)) => start.saturating_mul(limit) < total,
        _ => false,
    }
}

fn option_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Resolve `config` into one page of options.
pub async fn resolve_variable_model(
    config: &VariableModelConfig,
    query: &VariableModelQuery,
    client: &dyn ResourceClient,
) -> ConsoleResult<VariableModelResponse> {
    match config {
        VariableModelConfig::Resource {
            resource_type,
            id_key,
            name_key,
            search_targets,
            data_key,
            ..
        } => {
            let resource_type = resource_type
                .as_deref()
                .ok_or(VariableModelError::MissingResourceType)?;
            let api_path = resource_api_path(resource_type)?;

            let (results, total_count) = match data_key {
                Some(data_key) => {
                    let response = client
                        .stat(&api_path, distinct_stat_params(data_key, query))
                        .await?;
                    let results = response
                        .results
                        .iter()
                        .map(|d| {
                            let value = option_text(Some(d));
                            VariableOption::new(value.clone(), value)
                        })
                        .collect();
                    (results, response.total_count)
                }
                None => {
                    let params = resource_list_params(id_key, name_key, search_targets, query);
                    let response = client.list(&api_path, params).await?;
                    let results = response
                        .results
                        .iter()
                        .map(|d| {
                            VariableOption::new(
                                option_text(d.get(id_key.as_str())),
                                option_text(d.get(name_key.as_str())),
                            )
                        })
                        .collect();
                    (results, response.total_count)
                }
            };
            debug!(
                model = config.key(),
                api_path = %api_path,
                total_count = ?total_count,
                "resolved resource model"
            );
            Ok(VariableModelResponse {
                results,
                more: has_more(query, total_count),
            })
        }
        VariableModelConfig::Enum { values, .. } => Ok(resolve_enum(values, query)),
    }
}

/// Filter by case-insensitive search on key or name, then page locally.
fn resolve_enum(values: &[VariableOption], query: &VariableModelQuery) -> VariableModelResponse {
    let needle = query.search_text().map(str::to_lowercase);
    let matched: Vec<&VariableOption> = values
        .iter()
        .filter(|option| match &needle {
            Some(needle) => {
                option.key.to_lowercase().contains(needle)
                    || option.name.to_lowercase().contains(needle)
            }
            None => true,
        })
        .collect();

    match query.page() {
        Some((start, limit)) => {
            let offset = start.saturating_sub(1) as usize;
            let results = matched
                .iter()
                .skip(offset)
                .take(limit as usize)
                .map(|option| (*option).clone())
                .collect();
            VariableModelResponse {
                results,
                more: offset.saturating_add(limit as usize) < matched.len(),
            }
        }
        None => VariableModelResponse {
            results: matched.into_iter().cloned().collect(),
            more: false,
        },
    }
}

/// A variable model bound to a client.
///
/// Resolution never fails: errors go to the [`ErrorHandler`] and the last
/// successful response is returned instead.
pub struct VariableModel {
    config: VariableModelConfig,
    client: Arc<dyn ResourceClient>,
    error_handler: ErrorHandler,
    last_response: Mutex<VariableModelResponse>,
}

impl VariableModel {
    /// Fails when the config can never resolve.
    pub fn new(
        config: VariableModelConfig,
        client: Arc<dyn ResourceClient>,
        error_handler: ErrorHandler,
    ) -> ConsoleResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            error_handler,
            last_response: Mutex::new(VariableModelResponse::default()),
        })
    }

    pub fn config(&self) -> &VariableModelConfig {
        &self.config
    }

    pub async fn list(&self, query: &VariableModelQuery) -> VariableModelResponse {
        let result = resolve_variable_model(&self.config, query, self.client.as_ref()).await;
        let mut last = self.last_response.lock().await;
        if let Some(response) = self.error_handler.report(result) {
            *last = response;
        }
        last.clone()
    }
}
