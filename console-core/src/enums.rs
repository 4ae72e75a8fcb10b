//! Enum types shared by query keys, scope gating and reference lookups.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// APPLICATION SCOPE
// ============================================================================

/// Whether the console is operating as domain admin or inside a workspace.
///
/// Used only for cache partitioning: the mode is the second segment of
/// every query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppMode {
    Admin,
    Workspace,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Admin => "ADMIN",
            AppMode::Workspace => "WORKSPACE",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AppMode::Admin)
    }
}

/// Which family of queries a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryContextKind {
    /// Plain service API calls (`service.resource.verb`).
    Service,
    /// Reference-data lookups (names/labels for foreign ids).
    Reference,
}

impl QueryContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryContextKind::Service => "service",
            QueryContextKind::Reference => "reference",
        }
    }
}

/// Typed view of the context segments embedded in a query key.
///
/// Never used for fetching, only for invalidation filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryContext {
    pub context: QueryContextKind,
    pub mode: AppMode,
}

impl QueryContext {
    pub fn new(context: QueryContextKind, mode: AppMode) -> Self {
        Self { context, mode }
    }

    pub fn service(mode: AppMode) -> Self {
        Self::new(QueryContextKind::Service, mode)
    }

    pub fn reference(mode: AppMode) -> Self {
        Self::new(QueryContextKind::Reference, mode)
    }
}

/// Grant scope of the signed-in user's current token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantScope {
    System,
    Domain,
    Workspace,
    User,
}

impl GrantScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantScope::System => "SYSTEM",
            GrantScope::Domain => "DOMAIN",
            GrantScope::Workspace => "WORKSPACE",
            GrantScope::User => "USER",
        }
    }
}

// ============================================================================
// API VERBS
// ============================================================================

/// API verb of a `service.resource.verb` call.
///
/// The well-known verbs get their own variant because pagination handling
/// depends on them; anything else is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Get,
    List,
    Stat,
    Analyze,
    Load,
    Create,
    Update,
    Delete,
    Other(String),
}

impl Verb {
    pub fn as_str(&self) -> &str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Stat => "stat",
            Verb::Analyze => "analyze",
            Verb::Load => "load",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::Other(verb) => verb.as_str(),
        }
    }

    /// Verbs whose page info lives under `query.page`.
    pub fn uses_query_page(&self) -> bool {
        matches!(self, Verb::List | Verb::Stat | Verb::Analyze)
    }

    /// Verbs whose page info lives at the top-level `page` field.
    pub fn uses_top_level_page(&self) -> bool {
        matches!(self, Verb::Load)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let verb = match s {
            "get" => Verb::Get,
            "list" => Verb::List,
            "stat" => Verb::Stat,
            "analyze" => Verb::Analyze,
            "load" => Verb::Load,
            "create" => Verb::Create,
            "update" => Verb::Update,
            "delete" => Verb::Delete,
            other => Verb::Other(other.to_string()),
        };
        Ok(verb)
    }
}

impl From<&str> for Verb {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(verb) => verb,
            Err(never) => match never {},
        }
    }
}

// ============================================================================
// REFERENCE TYPES
// ============================================================================

/// Resource types that have reference data (id -> label lookups).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    CloudServiceType,
    CloudServiceQuerySet,
    Collector,
    CostDataSource,
    Plugin,
    Project,
    ProjectGroup,
    Protocol,
    Provider,
    PublicDashboard,
    Region,
    Secret,
    ServiceAccount,
    TrustedAccount,
    User,
    Webhook,
    Workspace,
}

impl ReferenceType {
    pub const ALL: [ReferenceType; 17] = [
        ReferenceType::CloudServiceType,
        ReferenceType::CloudServiceQuerySet,
        ReferenceType::Collector,
        ReferenceType::CostDataSource,
        ReferenceType::Plugin,
        ReferenceType::Project,
        ReferenceType::ProjectGroup,
        ReferenceType::Protocol,
        ReferenceType::Provider,
        ReferenceType::PublicDashboard,
        ReferenceType::Region,
        ReferenceType::Secret,
        ReferenceType::ServiceAccount,
        ReferenceType::TrustedAccount,
        ReferenceType::User,
        ReferenceType::Webhook,
        ReferenceType::Workspace,
    ];

    /// Snake-case name, as used in query keys and managed variable models.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::CloudServiceType => "cloud_service_type",
            ReferenceType::CloudServiceQuerySet => "cloud_service_query_set",
            ReferenceType::Collector => "collector",
            ReferenceType::CostDataSource => "cost_data_source",
            ReferenceType::Plugin => "plugin",
            ReferenceType::Project => "project",
            ReferenceType::ProjectGroup => "project_group",
            ReferenceType::Protocol => "protocol",
            ReferenceType::Provider => "provider",
            ReferenceType::PublicDashboard => "public_dashboard",
            ReferenceType::Region => "region",
            ReferenceType::Secret => "secret",
            ReferenceType::ServiceAccount => "service_account",
            ReferenceType::TrustedAccount => "trusted_account",
            ReferenceType::User => "user",
            ReferenceType::Webhook => "webhook",
            ReferenceType::Workspace => "workspace",
        }
    }

    /// camelCase name, as used by UI getters (`projectGroup`, `costDataSource`).
    pub fn property_name(&self) -> String {
        let mut out = String::with_capacity(self.as_str().len());
        let mut upper = false;
        for c in self.as_str().chars() {
            if c == '_' {
                upper = true;
            } else if upper {
                out.push(c.to_ascii_uppercase());
                upper = false;
            } else {
                out.push(c);
            }
        }
        out
    }
}

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_token(s);
        ReferenceType::ALL
            .iter()
            .copied()
            .find(|t| normalize_token(t.as_str()) == normalized)
            .ok_or_else(|| format!("Invalid ReferenceType: {}", s))
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "admin" => Ok(AppMode::Admin),
            "workspace" => Ok(AppMode::Workspace),
            _ => Err(format!("Invalid AppMode: {}", s)),
        }
    }
}

impl fmt::Display for QueryContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for GrantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "system" => Ok(GrantScope::System),
            "domain" => Ok(GrantScope::Domain),
            "workspace" => Ok(GrantScope::Workspace),
            "user" => Ok(GrantScope::User),
            _ => Err(format!("Invalid GrantScope: {}", s)),
        }
    }
}
