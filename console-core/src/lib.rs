//! Console Core - Shared Types
//!
//! Modes, scopes, verbs, reference data shapes, the error taxonomy and
//! configuration. All other console crates depend on this one; it holds no
//! caching logic of its own.

use chrono::{DateTime, Utc};

pub mod config;
pub mod context;
pub mod enums;
pub mod error;
pub mod reference;

pub use config::QueryClientConfig;
pub use context::AppContext;
pub use enums::{AppMode, GrantScope, QueryContext, QueryContextKind, ReferenceType, Verb};
pub use error::{
    ConfigError, ConsoleError, ConsoleResult, QueryError, ReferenceError, RequestError,
    VariableModelError,
};
pub use reference::{ListResponse, ReferenceItem, ReferenceMap, ReferenceTypeInfo};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
