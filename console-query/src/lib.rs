//! Console Query - Scoped Query Keys and Cache
//!
//! Builds hierarchical, immutable query keys partitioned by scope and app
//! mode, and caches query results behind explicit freshness contracts.
//! Reference data lives in `console-reference`, on top of this crate.

pub mod cache;
pub mod error_handler;
pub mod invalidation;
pub mod key;
pub mod pagination;
pub mod scoped;

pub use cache::{CacheRead, CacheStats, Freshness, QueryClient, QueryMeta, Watermark};
pub use error_handler::{ErrorDisposition, ErrorHandler, SessionFlags};
pub use invalidation::{
    invalidate, invalidate_reference_queries, invalidate_service_queries,
    reference_query_predicate, service_query_predicate, InvalidationScope,
};
pub use key::{
    app_context_segments, create_immutable_key_item, normalize_query_key_part,
    reference_prefix, reference_query_key, resource_prefix, service_prefix, KeyItem,
    KeySegment, QueryKey, ServiceQueryKey, ServiceQueryKeyBuilder,
};
pub use pagination::{
    add_page_to_verb_params, next_page_param, omit_page_from_load_params,
    omit_page_params_by_verb, omit_page_query_params, PageData, PageParams,
    ScopedPaginationQuery,
};
pub use scoped::{QueryOutcome, ScopedQuery};
