//! Cross-reference joins.
//!
//! Users carry the role their workspace binding points at, and projects
//! carry the project group they belong to. Both joins work on items that
//! were already built from their records, so synced items can be joined the
//! same way as loaded ones.

use console_core::{ReferenceItem, ReferenceMap};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// API path roles are listed from.
pub const ROLE_API_PATH: &str = "identity.role";

/// Role ids bound in `records`, first occurrence first.
pub fn bound_role_ids(records: &[Value]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in records.iter().filter_map(bound_role_id) {
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn bound_role_id(record: &Value) -> Option<&str> {
    record
        .get("role_binding_info")?
        .get("role_id")?
        .as_str()
        .filter(|id| !id.is_empty())
}

/// `list` params for the enabled roles among `role_ids`.
pub fn role_list_params(role_ids: &[String]) -> Value {
    json!({
        "query": {
            "only": ["role_id", "name", "role_type"],
            "filter": [
                { "k": "role_id", "v": role_ids, "o": "in" },
                { "k": "state", "v": "ENABLED", "o": "eq" }
            ]
        }
    })
}

/// Index role records by `role_id`.
pub fn roles_by_id(records: &[Value]) -> HashMap<String, Value> {
    records
        .iter()
        .filter_map(|role| {
            let id = role.get("role_id")?.as_str()?;
            Some((id.to_string(), role.clone()))
        })
        .collect()
}

/// Set `data.role_info` to the role bound to `item`, or `{}` when the
/// binding is missing or the role is unknown.
pub fn with_role_info(mut item: ReferenceItem, roles: &HashMap<String, Value>) -> ReferenceItem {
    let role_info = bound_role_id(&item.data)
        .and_then(|id| roles.get(id))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    set_data_field(&mut item, "role_info", role_info);
    item
}

/// Prefix the label with the project's group and set `data.group_info`.
///
/// Projects whose group is not in `groups` are returned unchanged.
pub fn with_project_group(item: ReferenceItem, groups: &ReferenceMap) -> ReferenceItem {
    let group = item
        .data
        .get("project_group_id")
        .and_then(Value::as_str)
        .and_then(|id| groups.get(id));
    let Some(group) = group else {
        return item;
    };

    let label = format!("{} > {}", group.label, item.label);
    let group_info = json!({ "id": group.key, "name": group.name });
    let mut item = item.with_label(label);
    set_data_field(&mut item, "group_info", group_info);
    item
}

fn set_data_field(item: &mut ReferenceItem, field: &str, value: Value) {
    if !item.data.is_object() {
        item.data = Value::Object(Map::new());
    }
    if let Some(data) = item.data.as_object_mut() {
        data.insert(field.to_string(), value);
    }
}
