//! Configuration for the query client and reference loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{ConfigError, ConsoleError, ConsoleResult};

/// Configuration for the query client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryClientConfig {
    /// How long fetched data counts as fresh when the caller does not say.
    pub default_stale_time: Duration,
    /// Entries not read for this long are dropped by `gc()`.
    pub gc_time: Duration,
    /// Freshness window for reference-data lists.
    pub reference_load_ttl: Duration,
    /// Page size for paginated queries.
    pub page_size: usize,
}

impl Default for QueryClientConfig {
    fn default() -> Self {
        Self {
            default_stale_time: Duration::from_secs(5 * 60),
            gc_time: Duration::from_secs(5 * 60),
            reference_load_ttl: Duration::from_secs(3 * 60 * 60),
            page_size: 15,
        }
    }
}

/// On-disk representation; durations are milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryClientConfigFile {
    default_stale_time_ms: Option<u64>,
    gc_time_ms: Option<u64>,
    reference_load_ttl_ms: Option<u64>,
    page_size: Option<usize>,
}

impl QueryClientConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default stale time.
    pub fn with_stale_time(mut self, duration: Duration) -> Self {
        self.default_stale_time = duration;
        self
    }

    /// Set the gc time.
    pub fn with_gc_time(mut self, duration: Duration) -> Self {
        self.gc_time = duration;
        self
    }

    /// Set the reference load TTL.
    pub fn with_reference_load_ttl(mut self, duration: Duration) -> Self {
        self.reference_load_ttl = duration;
        self
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CONSOLE_QUERY_STALE_TIME_MS` (default: 300000)
    /// - `CONSOLE_QUERY_GC_TIME_MS` (default: 300000)
    /// - `CONSOLE_REFERENCE_LOAD_TTL_MS` (default: 10800000)
    /// - `CONSOLE_QUERY_PAGE_SIZE` (default: 15)
    ///
    /// Values that do not parse, or that [`validate`](Self::validate) would
    /// reject, fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |name: &str| {
            lookup(name)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        Self {
            default_stale_time: millis("CONSOLE_QUERY_STALE_TIME_MS")
                .unwrap_or(defaults.default_stale_time),
            gc_time: millis("CONSOLE_QUERY_GC_TIME_MS").unwrap_or(defaults.gc_time),
            reference_load_ttl: millis("CONSOLE_REFERENCE_LOAD_TTL_MS")
                .filter(|ttl| !ttl.is_zero())
                .unwrap_or(defaults.reference_load_ttl),
            page_size: lookup("CONSOLE_QUERY_PAGE_SIZE")
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
        }
    }

    /// Load from a TOML file. Missing fields take their defaults.
    pub fn from_path(path: &Path) -> ConsoleResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML content. Missing fields take their defaults.
    pub fn from_toml_str(contents: &str) -> ConsoleResult<Self> {
        let file: QueryClientConfigFile =
            toml::from_str(contents).map_err(|e| ConfigError::Parse {
                reason: e.to_string(),
            })?;
        let defaults = Self::default();

        Ok(Self {
            default_stale_time: file
                .default_stale_time_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_stale_time),
            gc_time: file
                .gc_time_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.gc_time),
            reference_load_ttl: file
                .reference_load_ttl_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reference_load_ttl),
            page_size: file.page_size.unwrap_or(defaults.page_size),
        })
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - page_size > 0
    /// - reference_load_ttl is positive
    pub fn validate(&self) -> ConsoleResult<()> {
        if self.page_size == 0 {
            return Err(ConsoleError::Config(ConfigError::InvalidValue {
                field: "page_size".to_string(),
                value: self.page_size.to_string(),
                reason: "page_size must be greater than 0".to_string(),
            }));
        }

        if self.reference_load_ttl.is_zero() {
            return Err(ConsoleError::Config(ConfigError::InvalidValue {
                field: "reference_load_ttl".to_string(),
                value: format!("{:?}", self.reference_load_ttl),
                reason: "reference_load_ttl must be positive".to_string(),
            }));
        }

        Ok(())
    }
}
