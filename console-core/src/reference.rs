//! Reference data and list payload shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::ReferenceType;

/// One denormalized reference entity (user, project, region, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceItem {
    /// Entity id; also the key in its [`ReferenceMap`].
    pub key: String,
    /// Display label. Defaults to the name, or the key when unnamed.
    pub label: String,
    pub name: String,
    /// Extra per-type data (e.g. role info for users).
    #[serde(default)]
    pub data: Value,
}

impl ReferenceItem {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        let key = key.into();
        let name = name.into();
        let label = if name.is_empty() { key.clone() } else { name.clone() };
        Self {
            key,
            label,
            name,
            data: Value::Null,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Mapping from entity id to its reference item. Keys are unique per
/// resource type; iteration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceMap {
    items: HashMap<String, ReferenceItem>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item under its own key, replacing any previous entry.
    pub fn insert(&mut self, item: ReferenceItem) -> Option<ReferenceItem> {
        self.items.insert(item.key.clone(), item)
    }

    pub fn get(&self, id: &str) -> Option<&ReferenceItem> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Label for `id`, falling back to the raw id for unknown entities.
    pub fn label_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.items.get(id).map(|item| item.label.as_str()).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ReferenceItem)> {
        self.items.iter()
    }
}

impl FromIterator<ReferenceItem> for ReferenceMap {
    fn from_iter<I: IntoIterator<Item = ReferenceItem>>(iter: I) -> Self {
        let mut map = ReferenceMap::new();
        for item in iter {
            map.insert(item);
        }
        map
    }
}

/// Which record fields identify and name a reference type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceTypeInfo {
    pub resource_type: ReferenceType,
    pub id_key: &'static str,
    pub name_key: &'static str,
}

/// Payload shape of every `list` verb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

impl<T> Default for ListResponse<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            total_count: None,
        }
    }
}

impl<T> ListResponse<T> {
    pub fn new(results: Vec<T>, total_count: Option<u64>) -> Self {
        Self {
            results,
            total_count,
        }
    }
}
