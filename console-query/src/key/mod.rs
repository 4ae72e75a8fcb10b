//! Hierarchical query keys.
//!
//! Every cached query is addressed by a [`QueryKey`]: an ordered list of
//! segments whose first three are always the scope id, the app mode and the
//! query context. Everything after that depends on the context:
//!
//! ```text
//! service:   [scope_id, MODE, "service",   service, resource, verb, ...context_key, "pagination"?, params?]
//! reference: [scope_id, MODE, "reference", reference_type]
//! ```
//!
//! Invalidation filters read segments 1 and 2 positionally, so the layout is
//! fixed. Keys can only be built from an [`AppContext`], which makes it
//! impossible to produce a key that is not partitioned by scope and mode.

mod item;
mod service;

pub use item::{create_immutable_key_item, KeyItem};
pub use service::{ServiceQueryKey, ServiceQueryKeyBuilder};

use console_core::{AppContext, AppMode, QueryContext, QueryContextKind, ReferenceType};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Position of the app mode segment.
pub const MODE_INDEX: usize = 1;
/// Position of the query context segment.
pub const CONTEXT_INDEX: usize = 2;
/// Marker segment that separates paginated keys from their plain siblings.
pub const PAGINATION_SEGMENT: &str = "pagination";

/// One segment of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
    Text(Arc<str>),
    Mode(AppMode),
    Context(QueryContextKind),
    Item(KeyItem),
}

impl KeySegment {
    pub fn text(value: impl AsRef<str>) -> Self {
        KeySegment::Text(Arc::from(value.as_ref()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeySegment::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&KeyItem> {
        match self {
            KeySegment::Item(item) => Some(item),
            _ => None,
        }
    }
}

/// Strings become text segments so `["a"]` and `"a"` produce the same key.
impl From<KeyItem> for KeySegment {
    fn from(item: KeyItem) -> Self {
        match item {
            KeyItem::String(s) => KeySegment::Text(s),
            other => KeySegment::Item(other),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        KeySegment::text(value)
    }
}

impl Serialize for KeySegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeySegment::Text(s) => serializer.serialize_str(s),
            KeySegment::Mode(mode) => serializer.serialize_str(mode.as_str()),
            KeySegment::Context(kind) => serializer.serialize_str(kind.as_str()),
            KeySegment::Item(item) => item.serialize(serializer),
        }
    }
}

/// Spread an array into one segment per element; wrap anything else.
pub fn normalize_query_key_part(part: KeyItem) -> Vec<KeySegment> {
    match part {
        KeyItem::Array(items) => items.iter().cloned().map(KeySegment::from).collect(),
        other => vec![KeySegment::from(other)],
    }
}

/// An immutable, hashable query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    segments: Arc<[KeySegment]>,
}

impl QueryKey {
    /// Assemble a key from raw segments. Callers are responsible for the
    /// `[scope_id, mode, context, ..]` layout; prefer the builders.
    pub fn from_segments(segments: impl IntoIterator<Item = KeySegment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    pub fn get(&self, index: usize) -> Option<&KeySegment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment-wise prefix test.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.get(0).and_then(KeySegment::as_text)
    }

    pub fn mode(&self) -> Option<AppMode> {
        match self.get(MODE_INDEX) {
            Some(KeySegment::Mode(mode)) => Some(*mode),
            _ => None,
        }
    }

    pub fn context_kind(&self) -> Option<QueryContextKind> {
        match self.get(CONTEXT_INDEX) {
            Some(KeySegment::Context(kind)) => Some(*kind),
            _ => None,
        }
    }

    /// The `{context, mode}` pair this key was built under.
    pub fn query_context(&self) -> Option<QueryContext> {
        Some(QueryContext::new(self.context_kind()?, self.mode()?))
    }

    pub fn is_paginated(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| segment.as_text() == Some(PAGINATION_SEGMENT))
    }

    /// A new key with `extra` appended.
    pub fn with_segments(&self, extra: impl IntoIterator<Item = KeySegment>) -> QueryKey {
        QueryKey::from_segments(self.segments.iter().cloned().chain(extra))
    }
}

impl Serialize for QueryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.segments.iter())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// `[scope_id, mode, context]`, the leading segments of every key.
pub fn app_context_segments(ctx: &AppContext, kind: QueryContextKind) -> Vec<KeySegment> {
    vec![
        KeySegment::text(ctx.scope_id()),
        KeySegment::Mode(ctx.mode),
        KeySegment::Context(kind),
    ]
}

/// Prefix of every service query in the current scope.
pub fn service_prefix(ctx: &AppContext) -> QueryKey {
    QueryKey::from_segments(app_context_segments(ctx, QueryContextKind::Service))
}

/// Prefix of every query against one service resource (all verbs).
pub fn resource_prefix(ctx: &AppContext, service: &str, resource: &str) -> QueryKey {
    service_prefix(ctx).with_segments([KeySegment::text(service), KeySegment::text(resource)])
}

/// Prefix of every reference query in the current scope.
pub fn reference_prefix(ctx: &AppContext) -> QueryKey {
    QueryKey::from_segments(app_context_segments(ctx, QueryContextKind::Reference))
}

/// Key under which one reference type's map is cached.
pub fn reference_query_key(ctx: &AppContext, reference_type: ReferenceType) -> QueryKey {
    reference_prefix(ctx).with_segments([KeySegment::text(reference_type.as_str())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_key_layout() {
        let ctx = AppContext::workspace("domain-1", "ws-1");
        let key = reference_query_key(&ctx, ReferenceType::Project);

        assert_eq!(key.to_string(), r#"["ws-1","WORKSPACE","reference","project"]"#);
        assert_eq!(key.mode(), Some(AppMode::Workspace));
        assert_eq!(key.context_kind(), Some(QueryContextKind::Reference));
        assert_eq!(key.scope_id(), Some("ws-1"));
        assert!(key.starts_with(&reference_prefix(&ctx)));
    }

    #[test]
    fn test_admin_keys_partition_by_domain() {
        let ctx = AppContext::admin("domain-1");
        let key = reference_query_key(&ctx, ReferenceType::User);
        assert_eq!(key.scope_id(), Some("domain-1"));
        assert_eq!(
            key.query_context(),
            Some(QueryContext::reference(AppMode::Admin))
        );
    }

    #[test]
    fn test_normalize_spreads_arrays() {
        let spread = normalize_query_key_part(create_immutable_key_item(&json!(["a", "b"])));
        assert_eq!(spread, vec![KeySegment::text("a"), KeySegment::text("b")]);

        let single = normalize_query_key_part(KeyItem::from("a"));
        assert_eq!(single, vec![KeySegment::text("a")]);

        let object = normalize_query_key_part(create_immutable_key_item(&json!({"x": 1})));
        assert_eq!(object.len(), 1);
        assert!(object[0].as_item().is_some_and(KeyItem::is_object));
    }

    #[test]
    fn test_prefix_is_segment_wise() {
        let ctx = AppContext::admin("d");
        let project = resource_prefix(&ctx, "identity", "project");
        let project_group = resource_prefix(&ctx, "identity", "project_group");
        let key = project.with_segments([KeySegment::text("list")]);

        assert!(key.starts_with(&project));
        assert!(!key.starts_with(&project_group));
        assert!(key.starts_with(&service_prefix(&ctx)));
        assert!(!key.starts_with(&reference_prefix(&ctx)));
    }

    #[test]
    fn test_text_and_mode_segments_are_distinct() {
        let typed = QueryKey::from_segments([KeySegment::Mode(AppMode::Admin)]);
        let text = QueryKey::from_segments([KeySegment::text("ADMIN")]);
        assert_eq!(typed.to_string(), text.to_string());
        assert_ne!(typed, text);
    }
}
