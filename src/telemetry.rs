//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `operation`: retried operation (e.g. "validate")
//! - `status`: "ok" or "error"
//! - `outcome`: "success" or "failure"
//! - `reason`: eviction cause, "stale", "capacity" or "expired_fallback"

/// Model-list requests answered from a fresh cache entry.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Model-list requests that had to go to the server.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Fetch failures answered with a stale entry instead.
pub const CACHE_STALE_SERVED_TOTAL: &str = "huginn_cache_stale_served_total";

/// Entries evicted by the cache.
///
/// Labels: `reason`.
pub const CACHE_EVICTIONS_TOTAL: &str = "huginn_cache_evictions_total";

/// Requests sent to `/v1/models`.
///
/// Labels: `status` ("ok" | "error").
pub const FETCHES_TOTAL: &str = "huginn_fetches_total";

/// Total retry attempts (not counting the initial attempt).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "huginn_retries_total";

/// Completed validations.
///
/// Labels: `outcome` ("success" | "failure").
pub const VALIDATIONS_TOTAL: &str = "huginn_validations_total";
