//! Error types for console query operations

use thiserror::Error;

/// Query cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Fetch failed for query {key}: {reason}")]
    FetchFailed { key: String, reason: String },

    #[error("Serialization failed for query {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Scoped query {key} declares no required scopes")]
    MissingRequiredScopes { key: String },

    #[error("Invalid page {page}: pages are 1-based")]
    InvalidPage { page: usize },
}

/// Reference data errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("No reference factory registered for {name}")]
    UnregisteredResource { name: String },

    #[error("Loading {resource_type} references failed: {reason}")]
    LoadFailed { resource_type: String, reason: String },
}

/// Failures surfaced by the remote API client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Session expired")]
    SessionExpired,

    #[error("Permission denied: {action}")]
    PermissionDenied { action: String },

    #[error("Network failure: {reason}")]
    Network { reason: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

/// Variable model configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariableModelError {
    #[error("resource_type is required")]
    MissingResourceType,

    #[error("Invalid resource_type: {resource_type}")]
    InvalidResourceType { resource_type: String },

    #[error("Unknown managed variable model: {key}")]
    UnknownModel { key: String },
}

/// Master error type for all console query errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Variable model error: {0}")]
    VariableModel(#[from] VariableModelError),
}

/// Result type alias for console query operations.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

// =============================================================================
// TESTS
// =============================================================================
