//! Utilities for logging.

use tracing_subscriber::filter::EnvFilter;

/// Initialize a global tracing subscriber.
///
/// Respects `RUST_LOG` when set, falling back to the provided default
/// directive otherwise. Subsequent calls are no-ops.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// Initialize logging for tests.
///
/// Output goes through the test writer so it is captured per-test.
pub fn init_test() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
