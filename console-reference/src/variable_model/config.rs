//! Variable model definitions.

use console_core::{ConsoleResult, VariableModelError};
use serde::{Deserialize, Serialize};

/// One selectable option of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableOption {
    pub key: String,
    pub name: String,
}

impl VariableOption {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }
}

/// Where a variable's options come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariableModelConfig {
    /// Options listed from a remote resource.
    Resource {
        key: String,
        name: String,
        /// Dotted `service.Resource` name, e.g. `identity.ProjectGroup`.
        #[serde(default)]
        resource_type: Option<String>,
        id_key: String,
        name_key: String,
        /// Fields matched against the search text. Defaults to the id and
        /// name fields.
        #[serde(default)]
        search_targets: Vec<String>,
        /// When set, options are the distinct values of this field instead
        /// of the resource records themselves.
        #[serde(default)]
        data_key: Option<String>,
    },
    /// A fixed list of options.
    Enum {
        key: String,
        name: String,
        values: Vec<VariableOption>,
    },
}

impl VariableModelConfig {
    pub fn resource(
        key: impl Into<String>,
        name: impl Into<String>,
        resource_type: impl Into<String>,
        id_key: impl Into<String>,
    ) -> Self {
        VariableModelConfig::Resource {
            key: key.into(),
            name: name.into(),
            resource_type: Some(resource_type.into()),
            id_key: id_key.into(),
            name_key: "name".to_string(),
            search_targets: Vec::new(),
            data_key: None,
        }
    }

    pub fn enumeration(
        key: impl Into<String>,
        name: impl Into<String>,
        values: impl IntoIterator<Item = (&'static str, &'static str)>,
    ) -> Self {
        VariableModelConfig::Enum {
            key: key.into(),
            name: name.into(),
            values: values
                .into_iter()
                .map(|(key, name)| VariableOption::new(key, name))
                .collect(),
        }
    }

    /// Select the distinct values of `data_key` instead of records.
    /// No effect on enum models.
    pub fn with_data_key(mut self, data_key: impl Into<String>) -> Self {
        if let VariableModelConfig::Resource { data_key: slot, .. } = &mut self {
            *slot = Some(data_key.into());
        }
        self
    }

    pub fn key(&self) -> &str {
        match self {
            VariableModelConfig::Resource { key, .. } | VariableModelConfig::Enum { key, .. } => {
                key
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VariableModelConfig::Resource { name, .. }
            | VariableModelConfig::Enum { name, .. } => name,
        }
    }

    /// Check the model can be resolved at all.
    pub fn validate(&self) -> ConsoleResult<()> {
        if let VariableModelConfig::Resource { resource_type, .. } = self {
            let resource_type = resource_type
                .as_deref()
                .ok_or(VariableModelError::MissingResourceType)?;
            resource_api_path(resource_type)?;
        }
        Ok(())
    }
}

/// Search and paging inputs of one resolution. `start` is 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableModelQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Restrict distinct-value models to these values.
    #[serde(default)]
    pub filters: Vec<String>,
}

impl VariableModelQuery {
    pub fn search(search: impl Into<String>) -> Self {
        Self {
            search: Some(search.into()),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, start: u64, limit: u64) -> Self {
        self.start = Some(start);
        self.limit = Some(limit);
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Search text, if any is set and non-empty.
    pub fn search_text(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    pub fn page(&self) -> Option<(u64, u64)> {
        self.start.zip(self.limit)
    }
}

/// Options of one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableModelResponse {
    pub results: Vec<VariableOption>,
    /// Whether another page exists.
    pub more: bool,
}

/// Convert `identity.ProjectGroup` into the API path `identity.project_group`.
pub fn resource_api_path(resource_type: &str) -> ConsoleResult<String> {
    let invalid = || VariableModelError::InvalidResourceType {
        resource_type: resource_type.to_string(),
    };

    let parts: Vec<&str> = resource_type.split('.').collect();
    if parts.len() < 2 {
        return Err(invalid().into());
    }
    let mut path = Vec::with_capacity(parts.len());
    for part in parts {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid().into());
        }
        path.push(to_snake_case(part));
    }
    Ok(path.join("."))
}

fn to_snake_case(part: &str) -> String {
    let mut out = String::with_capacity(part.len() + 4);
    for (i, c) in part.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_core::ConsoleError;
    use serde_json::json;

    #[test]
    fn test_resource_api_path() {
        assert_eq!(
            resource_api_path("identity.ProjectGroup").unwrap(),
            "identity.project_group"
        );
        assert_eq!(
            resource_api_path("cost_analysis.DataSource").unwrap(),
            "cost_analysis.data_source"
        );
        assert_eq!(resource_api_path("inventory.region").unwrap(), "inventory.region");

        for bad in ["identity", "identity.", ".Project", "identity.Pro-ject", ""] {
            assert_eq!(
                resource_api_path(bad).unwrap_err(),
                ConsoleError::VariableModel(VariableModelError::InvalidResourceType {
                    resource_type: bad.to_string()
                }),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_validate() {
        let mut config = VariableModelConfig::resource("project", "Project", "identity.Project", "project_id");
        assert!(config.validate().is_ok());

        if let VariableModelConfig::Resource { resource_type, .. } = &mut config {
            *resource_type = None;
        }
        assert_eq!(
            config.validate().unwrap_err(),
            ConsoleError::VariableModel(VariableModelError::MissingResourceType)
        );

        let enumeration = VariableModelConfig::enumeration("g", "Granularity", [("DAILY", "Daily")]);
        assert!(enumeration.validate().is_ok());
    }

    #[test]
    fn test_tagged_serde() {
        let config: VariableModelConfig = serde_json::from_value(json!({
            "type": "enum",
            "key": "granularity",
            "name": "Granularity",
            "values": [{ "key": "DAILY", "name": "Daily" }]
        }))
        .unwrap();
        assert_eq!(config.key(), "granularity");
        assert!(matches!(config, VariableModelConfig::Enum { .. }));

        let resource = serde_json::to_value(VariableModelConfig::resource(
            "region",
            "Region",
            "inventory.Region",
            "region_code",
        ))
        .unwrap();
        assert_eq!(resource["type"], json!("resource"));
        assert_eq!(resource["id_key"], json!("region_code"));
    }

    #[test]
    fn test_query_helpers() {
        let query = VariableModelQuery::search("").with_page(2, 10);
        assert_eq!(query.search_text(), None);
        assert_eq!(query.page(), Some((2, 10)));
        assert_eq!(VariableModelQuery::default().page(), None);
    }
}
