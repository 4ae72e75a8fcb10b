//! Invalidation watermarks.
//!
//! The query client keeps one monotonically increasing sequence that every
//! invalidation bumps. Entries remember the sequence they were stored under,
//! so a read can tell whether the cache has been invalidated since.

use chrono::{DateTime, Utc};

/// A point in the client's invalidation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark {
    /// Number of invalidation rounds that had happened.
    pub sequence: u64,
    /// When this watermark was taken.
    pub observed_at: DateTime<Utc>,
}

impl Watermark {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            observed_at: Utc::now(),
        }
    }

    pub fn with_timestamp(sequence: u64, observed_at: DateTime<Utc>) -> Self {
        Self {
            sequence,
            observed_at,
        }
    }

    /// Before any invalidation.
    pub fn zero() -> Self {
        Self {
            sequence: 0,
            observed_at: DateTime::UNIX_EPOCH,
        }
    }

    pub fn is_newer_than(&self, other: &Watermark) -> bool {
        self.sequence > other.sequence
    }

    pub fn is_at_least(&self, other: &Watermark) -> bool {
        self.sequence >= other.sequence
    }

    /// Invalidation rounds between two watermarks.
    pub fn gap(&self, other: &Watermark) -> u64 {
        self.sequence.abs_diff(other.sequence)
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::zero()
    }
}
