//! Freshness contracts for query reads.
//!
//! Every read states how stale it is willing to accept data, and every read
//! returns a [`CacheRead`] describing what it actually got.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::watermark::Watermark;

/// Freshness requirement for a query read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Accept cached data younger than `max_staleness` that has not been
    /// invalidated. A zero window refetches on every read.
    BestEffort {
        /// Maximum acceptable age of cached data.
        max_staleness: Duration,
    },

    /// Accept cached data of any age until an invalidation touches it.
    ///
    /// Use this for data that only changes through the console's own
    /// mutations, which invalidate the affected keys.
    #[default]
    Consistent,
}

impl Freshness {
    pub fn best_effort(max_staleness: Duration) -> Self {
        Self::BestEffort { max_staleness }
    }

    pub fn consistent() -> Self {
        Self::Consistent
    }

    /// Refetch on every read.
    pub fn always_refetch() -> Self {
        Self::BestEffort {
            max_staleness: Duration::ZERO,
        }
    }

    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::BestEffort { .. })
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }

    /// The BestEffort window, or `None` for Consistent reads.
    pub fn max_staleness(&self) -> Option<Duration> {
        match self {
            Self::BestEffort { max_staleness } => Some(*max_staleness),
            Self::Consistent => None,
        }
    }

    /// Whether an entry of the given age and invalidation state may be served.
    pub fn accepts(&self, age: Duration, invalidated: bool) -> bool {
        if invalidated {
            return false;
        }
        match self {
            Self::BestEffort { max_staleness } => age < *max_staleness,
            Self::Consistent => true,
        }
    }
}

/// Result of a query read, carrying staleness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    /// When the value was stored (or fetched, for misses).
    cached_at: DateTime<Utc>,
    /// Invalidation watermark the value was stored under.
    watermark: Watermark,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A read served from the cache.
    pub fn from_cache(value: T, cached_at: DateTime<Utc>, watermark: Watermark) -> Self {
        Self {
            value,
            cached_at,
            watermark,
            was_cache_hit: true,
        }
    }

    /// A read that ran the fetcher.
    pub fn from_fetch(value: T, watermark: Watermark) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            watermark,
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// True if the data was stored at or after `timestamp`.
    pub fn is_fresh_as_of(&self, timestamp: DateTime<Utc>) -> bool {
        self.cached_at >= timestamp
    }

    /// Time since the data was stored.
    pub fn staleness(&self) -> Duration {
        (Utc::now() - self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            watermark: self.watermark,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
