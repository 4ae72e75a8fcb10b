//! Built-in variable models, looked up by key.

use console_core::{ConsoleResult, VariableModelError};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use super::config::VariableModelConfig;

static MANAGED_VARIABLE_MODELS: Lazy<BTreeMap<String, VariableModelConfig>> =
    Lazy::new(|| {
        let enums = [
            VariableModelConfig::enumeration(
                "granularity",
                "Granularity",
                [("DAILY", "Daily"), ("MONTHLY", "Monthly"), ("YEARLY", "Yearly")],
            ),
            VariableModelConfig::enumeration(
                "cost_default_field",
                "Cost Default Field",
                [
                    ("workspace_id", "Workspace"),
                    ("project_id", "Project"),
                    ("project_group_id", "Project Group"),
                    ("service_account_id", "Service Account"),
                    ("region_code", "Region"),
                    ("provider", "Provider"),
                    ("product", "Product"),
                    ("usage_type", "Usage Type"),
                ],
            ),
            VariableModelConfig::enumeration(
                "cost_default_data_type",
                "Cost Default Data Type",
                [("cost", "Cost"), ("usage_quantity", "Usage")],
            ),
            VariableModelConfig::enumeration(
                "asset_default_field",
                "Asset Default Field",
                [
                    ("project_id", "Project"),
                    ("project_group_id", "Project Group"),
                    ("service_account_id", "Service Account"),
                    ("region_code", "Region"),
                    ("provider", "Provider"),
                    ("cloud_service_type", "Cloud Service Type"),
                ],
            ),
        ];

        let resources = [
            ("app", "App", "identity.App", "app_id"),
            ("cloud_service", "Cloud Service", "inventory.CloudService", "cloud_service_id"),
            (
                "cloud_service_query_set",
                "Cloud Service Query Set",
                "inventory.CloudServiceQuerySet",
                "query_set_id",
            ),
            (
                "cloud_service_type",
                "Cloud Service Type",
                "inventory.CloudServiceType",
                "cloud_service_type_id",
            ),
            ("collector", "Collector", "inventory.Collector", "collector_id"),
            ("cost", "Cost", "cost_analysis.Cost", "cost_id"),
            ("cost_data_source", "Data Source", "cost_analysis.DataSource", "data_source_id"),
            ("metric_data", "Metric Data", "inventory.MetricData", "metric_id"),
            ("project", "Project", "identity.Project", "project_id"),
            ("project_group", "Project Group", "identity.ProjectGroup", "project_group_id"),
            ("provider", "Provider", "identity.Provider", "provider"),
            ("region", "Region", "inventory.Region", "region_code"),
            ("role", "Role", "identity.Role", "role_id"),
            ("secret", "Secret", "secret.Secret", "secret_id"),
            ("service", "Service", "alert_manager.Service", "service_id"),
            (
                "service_account",
                "Service Account",
                "identity.ServiceAccount",
                "service_account_id",
            ),
            ("unified_cost", "Unified Cost", "cost_analysis.UnifiedCost", "unified_cost_id"),
            ("user", "User", "identity.User", "user_id"),
            ("user_group", "User Group", "identity.UserGroup", "user_group_id"),
            ("webhook", "Webhook", "monitoring.Webhook", "webhook_id"),
            ("workspace", "Workspace", "identity.Workspace", "workspace_id"),
            ("workspace_group", "Workspace Group", "identity.WorkspaceGroup", "workspace_group_id"),
        ]
        .into_iter()
        .map(|(key, name, resource_type, id_key)| {
            VariableModelConfig::resource(key, name, resource_type, id_key)
        });

        enums
            .into_iter()
            .chain(resources)
            .map(|config| (config.key().to_string(), config))
            .collect()
    });

/// The managed model registered under `key`.
pub fn managed_variable_model(key: &str) -> ConsoleResult<VariableModelConfig> {
    MANAGED_VARIABLE_MODELS.get(key).cloned().ok_or_else(|| {
        VariableModelError::UnknownModel {
            key: key.to_string(),
        }
        .into()
    })
}

/// Keys of every managed model, sorted.
pub fn managed_variable_model_keys() -> impl Iterator<Item = &'static str> {
    MANAGED_VARIABLE_MODELS.keys().map(String::as_str)
}
