//! Test log output.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Installs a global fmt subscriber that writes through the test harness.
///
/// Honors `RUST_LOG` and defaults to `debug` for workspace crates. Safe to call
/// from every test; only the first call installs anything.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("ledger_host=debug,ledger_host_handle=debug"));
        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer().with_thread_names(true))
            .try_init();
    });
}
