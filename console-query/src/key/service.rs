//! Service query keys.

use console_core::{AppContext, QueryContextKind, Verb};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

use super::{
    app_context_segments, create_immutable_key_item, normalize_query_key_part, KeyItem,
    KeySegment, QueryKey, PAGINATION_SEGMENT,
};
use crate::pagination::omit_page_params_by_verb;
use console_core::{ConsoleResult, QueryError};

/// Builder for a [`ServiceQueryKey`].
///
/// ```ignore
/// let list = ServiceQueryKey::builder(&ctx, "identity", "project", Verb::List)
///     .params(json!({"query": {"page": {"start": 1, "limit": 15}}}))
///     .pagination(true)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ServiceQueryKeyBuilder<'a> {
    ctx: &'a AppContext,
    service: String,
    resource: String,
    verb: Verb,
    context_key: Option<Value>,
    params: Option<Value>,
    pagination: bool,
}

impl<'a> ServiceQueryKeyBuilder<'a> {
    /// Scope the key further, e.g. by a selected id. Arrays contribute one
    /// segment per element; null and empty strings are ignored.
    pub fn context_key(mut self, context_key: impl Into<Value>) -> Self {
        self.context_key = Some(context_key.into());
        self
    }

    /// Request parameters, frozen into the last key segment.
    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Typed request parameters.
    pub fn params_from<T: Serialize>(self, params: &T) -> ConsoleResult<Self> {
        let value = serde_json::to_value(params).map_err(|e| QueryError::Serialization {
            key: format!("{}/{}/{}", self.service, self.resource, self.verb),
            reason: e.to_string(),
        })?;
        Ok(self.params(value))
    }

    /// Mark the key as paginated: page params are stripped by verb so every
    /// page of one listing shares a key.
    pub fn pagination(mut self, pagination: bool) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn build(self) -> ServiceQueryKey {
        if self.service.is_empty() || self.resource.is_empty() || self.verb.as_str().is_empty() {
            warn!(
                service = %self.service,
                resource = %self.resource,
                verb = %self.verb,
                "service query key built without service, resource or verb"
            );
        }

        let params = self.params.map(|params| {
            if !params.is_object() {
                warn!(verb = %self.verb, "service query params must be a non-null object");
            }
            let params = if self.pagination {
                omit_page_params_by_verb(&self.verb, params)
            } else {
                params
            };
            create_immutable_key_item(&params)
        });

        let mut segments = app_context_segments(self.ctx, QueryContextKind::Service);
        segments.push(KeySegment::text(&self.service));
        segments.push(KeySegment::text(&self.resource));
        segments.push(KeySegment::text(self.verb.as_str()));

        if let Some(context_key) = self.context_key.as_ref() {
            let item = create_immutable_key_item(context_key);
            if !item.is_falsy() {
                segments.extend(normalize_query_key_part(item));
            }
        }
        if self.pagination {
            segments.push(KeySegment::text(PAGINATION_SEGMENT));
        }
        if let Some(params) = params.as_ref() {
            segments.push(KeySegment::Item(params.clone()));
        }

        ServiceQueryKey {
            key: QueryKey::from_segments(segments),
            params,
            suffixes: Mutex::new(HashMap::new()),
        }
    }
}

/// A built service key together with the frozen params it embeds.
#[derive(Debug)]
pub struct ServiceQueryKey {
    key: QueryKey,
    params: Option<KeyItem>,
    suffixes: Mutex<HashMap<KeyItem, QueryKey>>,
}

impl ServiceQueryKey {
    pub fn builder<'a>(
        ctx: &'a AppContext,
        service: impl Into<String>,
        resource: impl Into<String>,
        verb: impl Into<Verb>,
    ) -> ServiceQueryKeyBuilder<'a> {
        ServiceQueryKeyBuilder {
            ctx,
            service: service.into(),
            resource: resource.into(),
            verb: verb.into(),
            context_key: None,
            params: None,
            pagination: false,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The frozen params, page fields already removed for paginated keys.
    pub fn params(&self) -> Option<&KeyItem> {
        self.params.as_ref()
    }

    /// This key extended by `suffix`.
    ///
    /// Object and array suffixes are frozen, normalized and memoized, so
    /// equal suffixes yield keys that share storage. Primitives are appended
    /// as a single segment.
    pub fn with_suffix(&self, suffix: &Value) -> QueryKey {
        if !(suffix.is_object() || suffix.is_array()) {
            return self
                .key
                .with_segments([KeySegment::from(create_immutable_key_item(suffix))]);
        }

        let item = create_immutable_key_item(suffix);
        let Ok(mut suffixes) = self.suffixes.lock() else {
            return self.key.with_segments(normalize_query_key_part(item));
        };
        if let Some(cached) = suffixes.get(&item) {
            return cached.clone();
        }
        let key = self.key.with_segments(normalize_query_key_part(item.clone()));
        suffixes.insert(item, key.clone());
        key
    }
}

impl Clone for ServiceQueryKey {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            params: self.params.clone(),
            suffixes: Mutex::new(HashMap::new()),
        }
    }
}

impl From<ServiceQueryKey> for QueryKey {
    fn from(service_key: ServiceQueryKey) -> Self {
        service_key.key
    }
}
