//! Caching subsystem.
//!
//! [`ModelStatusCache`] holds the model lists reported by each inference
//! server, keyed on the normalized base URL. It bounds the request rate
//! against a server whose model list changes rarely but whose `/v1/models`
//! query is slow relative to per-request validation.
//!
//! # Policy
//!
//! - Fresh entries (`age < ttl`) are served without I/O.
//! - Expired entries trigger a refresh. If the refresh fails, the expired
//!   list is served as a degraded fallback until it is `5 × ttl` old, after
//!   which it is evicted and the failure propagates.
//! - The cache holds at most `max_entries` servers. Overflow triggers a
//!   synchronous sweep: entries past `5 × ttl` go first, then oldest-first.
//!
//! Callers always receive copies of the cached lists.

mod status;

pub use status::{CacheConfig, CacheEntry, CacheStats, EntryStats, ModelStatusCache};
