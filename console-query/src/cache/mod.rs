//! Query cache with explicit freshness contracts.
//!
//! Callers state their staleness tolerance via [`Freshness`] and get back a
//! [`CacheRead<T>`] that says whether the data came from the cache, when it
//! was stored and under which invalidation [`Watermark`].
//!
//! # Example
//!
//! ```ignore
//! // Reference lists may be hours old.
//! let read = client
//!     .fetch_query(&key, Freshness::best_effort(Duration::from_secs(3 * 3600)), fetch)
//!     .await?;
//!
//! // Detail views must reflect every mutation made through the console.
//! let read = client.fetch_query(&key, Freshness::Consistent, fetch).await?;
//! ```

pub mod client;
pub mod freshness;
pub mod stats;
pub mod watermark;

pub use client::{QueryClient, QueryMeta};
pub use freshness::{CacheRead, Freshness};
pub use stats::CacheStats;
pub use watermark::Watermark;
