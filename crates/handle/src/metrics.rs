//! Handle metrics recorded via the `metrics` crate.
//!
//! ## Metric Naming Conventions
//!
//! All metrics follow the pattern: `ledger_host_{subsystem}_{name}_{unit}`
//!
//! - Counters: `_total` suffix
//! - Gauges: no suffix
//!
//! Nothing is exported unless the embedding process installs a recorder.

use ledger_host_types::ErrorCode;
use metrics::{counter, gauge};

// =============================================================================
// Metric Names (constants for consistency)
// =============================================================================

// Fencing metrics
const FENCE_ATTEMPTS_TOTAL: &str = "ledger_host_fence_attempts_total";
const FENCE_PERSISTED_TOTAL: &str = "ledger_host_fence_persisted_total";
const FENCE_LOG_FAILURES_TOTAL: &str = "ledger_host_fence_log_failures_total";

// Access metrics
const UNAUTHORIZED_ACCESS_TOTAL: &str = "ledger_host_unauthorized_access_total";
const HANDLE_ERRORS_TOTAL: &str = "ledger_host_handle_errors_total";

// Handle cache metrics
const CACHED_HANDLES: &str = "ledger_host_cached_handles";
const RECENTLY_DELETED_EVICTIONS_TOTAL: &str = "ledger_host_recently_deleted_evictions_total";

/// Decision taken by a fence call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FencePath {
    /// This call flipped the store's fenced bit.
    First,
    /// The fence marker is already durable; no journal call.
    AlreadyPersisted,
    /// Joined the outstanding append.
    InFlight,
    /// Previous append failed or never ran; appending again.
    Retry,
}

impl FencePath {
    /// Label value for this path.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::AlreadyPersisted => "already_persisted",
            Self::InFlight => "in_flight",
            Self::Retry => "retry",
        }
    }
}

// =============================================================================
// Fencing Metrics
// =============================================================================

/// Records a fence call and the path it took.
///
/// `ledger_host_fence_attempts_total{path}`.
#[inline]
pub fn record_fence_attempt(path: FencePath) {
    counter!(FENCE_ATTEMPTS_TOTAL, "path" => path.as_str()).increment(1);
}

/// Records the first durable fence marker for a handle.
#[inline]
pub fn record_fence_persisted() {
    counter!(FENCE_PERSISTED_TOTAL).increment(1);
}

/// Records a fence marker append that did not become durable.
///
/// `reason` is `"rc"`, `"interrupted"` or `"journal"`.
#[inline]
pub fn record_fence_log_failure(reason: &'static str) {
    counter!(FENCE_LOG_FAILURES_TOTAL, "reason" => reason).increment(1);
}

// =============================================================================
// Access Metrics
// =============================================================================

/// Records a master key mismatch.
#[inline]
pub fn record_unauthorized_access() {
    counter!(UNAUTHORIZED_ACCESS_TOTAL).increment(1);
}

/// Records a handle error by its error code.
#[inline]
pub fn record_handle_error(code: ErrorCode) {
    counter!(HANDLE_ERRORS_TOTAL, "code" => code.to_string()).increment(1);
}

// =============================================================================
// Handle Cache Metrics
// =============================================================================

/// Sets the number of cached handles of a kind (`"writable"` or `"read_only"`).
#[inline]
pub fn set_cached_handles(kind: &'static str, count: usize) {
    gauge!(CACHED_HANDLES, "kind" => kind).set(count as f64);
}

/// Records fenced-and-deleted ledgers dropped from memory early due to the
/// capacity bound.
#[inline]
pub fn record_recently_deleted_evictions(count: usize) {
    counter!(RECENTLY_DELETED_EVICTIONS_TOTAL).increment(count as u64);
}
