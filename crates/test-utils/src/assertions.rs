//! Test assertion helpers.
//!
//! Provides polling-based assertions for async and threaded test scenarios.

use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Default polling interval for [`assert_eventually`] and [`wait_until`].
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls a condition until it returns true or the timeout expires.
///
/// This is useful for testing async operations where the exact timing
/// is non-deterministic. It avoids flaky tests that use fixed sleeps.
///
/// # Returns
///
/// `true` if the condition became true before timeout, `false` otherwise.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ledger_host_test_utils::assert_eventually;
///
/// #[tokio::test]
/// async fn test_fence_completes() {
///     let done = || true;
///     assert!(assert_eventually(Duration::from_millis(200), done).await);
/// }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(DEFAULT_POLL_INTERVAL).await;
    }

    // Final check after timeout
    condition()
}

/// Blocking counterpart of [`assert_eventually`] for thread-based tests.
pub fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(DEFAULT_POLL_INTERVAL);
    }

    condition()
}
