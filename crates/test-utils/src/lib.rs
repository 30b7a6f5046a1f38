//! Shared test utilities for ledger host crates.
//!
//! This crate provides common test helpers to reduce boilerplate across test modules:
//!
//! - [`FaultyStorage`] - Record store that fails selected operations on demand
//! - [`ScriptedJournal`] - Journal whose completions the test drives
//! - [`assert_eventually`] / [`wait_until`] - Poll a condition until it's true or timeout
//! - [`test_handle_config`] - Handle configuration tuned for tests
//! - [`init_tracing`] - Route `tracing` output through the test harness

#![deny(unsafe_code)]
// Test utilities are allowed to use unwrap for simplicity
#![cfg_attr(test, allow(clippy::disallowed_methods))]

mod assertions;
pub use assertions::{assert_eventually, wait_until};

mod config;
pub use config::test_handle_config;

mod fault_injector;
pub use fault_injector::{FaultyStorage, StorageOp};

mod scripted_journal;
pub use scripted_journal::{AckMode, ScriptedJournal};

pub mod strategies;

mod tracing;
pub use self::tracing::init_tracing;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    // ============================================
    // assert_eventually tests
    // ============================================

    #[tokio::test]
    async fn test_assert_eventually_immediate_success() {
        let result = assert_eventually(Duration::from_millis(100), || true).await;
        assert!(result, "immediately true condition should succeed");
    }

    #[tokio::test]
    async fn test_assert_eventually_delayed_success() {
        let counter = AtomicUsize::new(0);
        let result = assert_eventually(Duration::from_millis(500), || {
            let val = counter.fetch_add(1, Ordering::SeqCst);
            val >= 3
        })
        .await;
        assert!(result, "condition should eventually become true");
        assert!(counter.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_assert_eventually_timeout() {
        let result = assert_eventually(Duration::from_millis(50), || false).await;
        assert!(!result, "never-true condition should timeout");
    }

    // ============================================
    // wait_until tests
    // ============================================

    #[test]
    fn test_wait_until_observes_other_thread() {
        let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let setter = std::sync::Arc::clone(&flag);
        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            setter.store(true, Ordering::SeqCst);
        });

        assert!(wait_until(Duration::from_secs(2), || flag.load(Ordering::SeqCst)));
        worker.join().unwrap();
    }

    #[test]
    fn test_wait_until_timeout() {
        assert!(!wait_until(Duration::from_millis(30), || false));
    }

    // ============================================
    // Config helper tests
    // ============================================

    #[test]
    fn test_handle_config_is_valid() {
        let config = test_handle_config();
        config.validate().expect("test config should validate");
        assert_eq!(config.recently_deleted_ttl, Duration::from_secs(1));
        assert!(!config.fence_ack_before_sync);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
