//! Tracing initialisation for tests.

use tracing_subscriber::EnvFilter;

/// Route tracing output to the test harness writer, filtered by `RUST_LOG`
/// (default `promptcode_core=debug`).
///
/// Only the first call in a process installs the subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("promptcode_core=debug")),
        )
        .with_test_writer()
        .try_init();
}
