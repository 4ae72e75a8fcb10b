//! Application context passed explicitly to key builders and scoped queries.

use serde::{Deserialize, Serialize};

use crate::{AppMode, GrantScope};

/// Snapshot of the console's current scope.
///
/// Query keys are partitioned by `scope_id()` and `mode`, and scoped
/// queries consult `grant_scope` and `grant_loading` before fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppContext {
    pub mode: AppMode,
    pub domain_id: String,
    pub workspace_id: Option<String>,
    pub grant_scope: Option<GrantScope>,
    /// True while the grant for the current scope is still being resolved.
    pub grant_loading: bool,
}

impl AppContext {
    /// Domain-admin context with a resolved `DOMAIN` grant.
    pub fn admin(domain_id: impl Into<String>) -> Self {
        Self {
            mode: AppMode::Admin,
            domain_id: domain_id.into(),
            workspace_id: None,
            grant_scope: Some(GrantScope::Domain),
            grant_loading: false,
        }
    }

    /// Workspace context with a resolved `WORKSPACE` grant.
    pub fn workspace(domain_id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            mode: AppMode::Workspace,
            domain_id: domain_id.into(),
            workspace_id: Some(workspace_id.into()),
            grant_scope: Some(GrantScope::Workspace),
            grant_loading: false,
        }
    }

    pub fn with_grant_scope(mut self, grant_scope: Option<GrantScope>) -> Self {
        self.grant_scope = grant_scope;
        self
    }

    pub fn with_grant_loading(mut self, loading: bool) -> Self {
        self.grant_loading = loading;
        self
    }

    /// Identifier the cache is partitioned by.
    ///
    /// Admin mode is domain-wide; workspace mode falls back to the domain
    /// when no workspace has been selected yet.
    pub fn scope_id(&self) -> &str {
        match (self.mode, self.workspace_id.as_deref()) {
            (AppMode::Workspace, Some(workspace_id)) => workspace_id,
            _ => &self.domain_id,
        }
    }

    pub fn is_admin_mode(&self) -> bool {
        self.mode.is_admin()
    }

    pub fn is_ready(&self) -> bool {
        !self.grant_loading
    }
}
