//! Test configuration helpers.

use std::time::Duration;

use ledger_host_types::config::HandleConfig;

/// Returns a handle configuration suitable for tests.
///
/// - `recently_deleted_ttl`: 1s (the minimum, so expiry tests stay fast)
/// - `recently_deleted_capacity`: 16
/// - `fence_ack_before_sync`: false
#[must_use]
pub fn test_handle_config() -> HandleConfig {
    HandleConfig {
        recently_deleted_ttl: Duration::from_secs(1),
        recently_deleted_capacity: 16,
        fence_ack_before_sync: false,
    }
}
