//! Where each reference type is loaded from and how its records become
//! [`ReferenceItem`]s.

use console_core::{
    AppMode, ReferenceItem, ReferenceMap, ReferenceType, ReferenceTypeInfo, Verb,
};
use serde_json::{json, Map, Value};

/// How a record's display label is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    /// The name, falling back to the id.
    Name,
    /// `"id (name)"`, or just the id when unnamed.
    IdWithName,
}

/// Lookup joined into a type's records once they are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceJoin {
    None,
    /// Resolve each user's role binding against `identity.role`.
    UserRoles,
    /// Resolve each project's group against the project group references.
    ProjectGroups,
}

/// The API call that lists one reference type in one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub api_path: &'static str,
    pub verb: Verb,
}

impl Endpoint {
    /// Only plain `list` endpoints accept a query body.
    pub fn takes_query(&self) -> bool {
        self.verb == Verb::List
    }
}

/// Static description of one reference type's remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSource {
    pub info: ReferenceTypeInfo,
    admin_path: &'static str,
    workspace_path: &'static str,
    /// Verb of the workspace endpoint when it is not `list`.
    workspace_verb: Option<&'static str>,
    /// Requested on top of the id and name fields.
    extra_fields: &'static [&'static str],
    pub label: LabelStyle,
    pub join: ReferenceJoin,
}

const fn source(
    resource_type: ReferenceType,
    id_key: &'static str,
    path: &'static str,
    extra_fields: &'static [&'static str],
) -> ReferenceSource {
    ReferenceSource {
        info: ReferenceTypeInfo {
            resource_type,
            id_key,
            name_key: "name",
        },
        admin_path: path,
        workspace_path: path,
        workspace_verb: None,
        extra_fields,
        label: LabelStyle::Name,
        join: ReferenceJoin::None,
    }
}

/// Source of `reference_type`.
pub fn reference_source(reference_type: ReferenceType) -> ReferenceSource {
    use ReferenceType::*;
    match reference_type {
        CloudServiceType => source(
            reference_type,
            "cloud_service_type_id",
            "inventory.cloud_service_type",
            &["group", "provider", "icon"],
        ),
        CloudServiceQuerySet => source(
            reference_type,
            "query_set_id",
            "inventory.cloud_service_query_set",
            &["provider", "cloud_service_group", "cloud_service_type"],
        ),
        Collector => source(
            reference_type,
            "collector_id",
            "inventory.collector",
            &["plugin_info"],
        ),
        CostDataSource => source(
            reference_type,
            "data_source_id",
            "cost_analysis.data_source",
            &[
                "plugin_info",
                "cost_tag_keys",
                "cost_additional_info_keys",
                "cost_data_keys",
            ],
        ),
        Plugin => source(reference_type, "plugin_id", "repository.plugin", &["image", "tags"]),
        Project => ReferenceSource {
            join: ReferenceJoin::ProjectGroups,
            ..source(
                reference_type,
                "project_id",
                "identity.project",
                &["project_group_id", "users", "project_type", "workspace_id"],
            )
        },
        ProjectGroup => source(
            reference_type,
            "project_group_id",
            "identity.project_group",
            &["parent_group_id", "workspace_id"],
        ),
        Protocol => source(
            reference_type,
            "protocol_id",
            "notification.protocol",
            &["plugin_info"],
        ),
        Provider => source(reference_type, "provider", "identity.provider", &["color", "icon", "alias"]),
        PublicDashboard => source(
            reference_type,
            "public_dashboard_id",
            "dashboard.public_dashboard",
            &[],
        ),
        Region => source(reference_type, "region_code", "inventory.region", &["provider", "region_id"]),
        Secret => source(reference_type, "secret_id", "secret.secret", &[]),
        ServiceAccount => source(
            reference_type,
            "service_account_id",
            "identity.service_account",
            &["provider", "project_id"],
        ),
        TrustedAccount => source(
            reference_type,
            "trusted_account_id",
            "identity.trusted_account",
            &["provider"],
        ),
        User => ReferenceSource {
            workspace_path: "identity.workspace_user",
            label: LabelStyle::IdWithName,
            join: ReferenceJoin::UserRoles,
            ..source(reference_type, "user_id", "identity.user", &["role_binding_info"])
        },
        Webhook => source(reference_type, "webhook_id", "monitoring.webhook", &["plugin_info"]),
        Workspace => ReferenceSource {
            workspace_path: "identity.user_profile",
            workspace_verb: Some("get_workspaces"),
            ..source(reference_type, "workspace_id", "identity.workspace", &["state", "tags"])
        },
    }
}

/// Id and name field names of `reference_type`.
pub fn reference_type_info(reference_type: ReferenceType) -> ReferenceTypeInfo {
    reference_source(reference_type).info
}

pub fn api_path(reference_type: ReferenceType, mode: AppMode) -> &'static str {
    reference_source(reference_type).endpoint(mode).api_path
}

impl ReferenceSource {
    pub fn endpoint(&self, mode: AppMode) -> Endpoint {
        match mode {
            AppMode::Admin => Endpoint {
                api_path: self.admin_path,
                verb: Verb::List,
            },
            AppMode::Workspace => Endpoint {
                api_path: self.workspace_path,
                verb: self.workspace_verb.map_or(Verb::List, Verb::from),
            },
        }
    }

    /// Fields requested from the server, id and name first.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = vec![self.info.id_key, self.info.name_key];
        fields.extend(self.extra_fields.iter().copied());
        fields
    }

    /// Request body for `mode`'s endpoint. Non-list endpoints take none.
    pub fn load_params(&self, mode: AppMode) -> Value {
        if self.endpoint(mode).takes_query() {
            json!({ "query": { "only": self.fields() } })
        } else {
            Value::Null
        }
    }

    /// Build the item for one record. Records without an id are skipped.
    pub fn item_from_record(&self, record: &Value) -> Option<ReferenceItem> {
        let id = scalar_text(record.get(self.info.id_key)?)?;
        if id.is_empty() {
            return None;
        }
        let name = record
            .get(self.info.name_key)
            .and_then(scalar_text)
            .unwrap_or_default();

        let data: Map<String, Value> = record
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(k, _)| *k != self.info.id_key && *k != self.info.name_key)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let item = match self.label {
            LabelStyle::Name => ReferenceItem::new(id, name),
            LabelStyle::IdWithName if name.is_empty() => ReferenceItem::new(id, name),
            LabelStyle::IdWithName => {
                let label = format!("{} ({})", id, name);
                ReferenceItem::new(id, name).with_label(label)
            }
        };
        Some(item.with_data(Value::Object(data)))
    }

    /// Later records win on duplicate ids.
    pub fn build_map<'a>(&self, records: impl IntoIterator<Item = &'a Value>) -> ReferenceMap {
        records
            .into_iter()
            .filter_map(|record| self.item_from_record(record))
            .collect()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
