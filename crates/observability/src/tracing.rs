//! Tracing/logging initialization.
//!
//! Engines emit structured events (account/card ids, actor ids, amounts,
//! outcomes); this wires them to JSON output with env-based filtering.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    // Engines log at info; stores stay quiet unless RUST_LOG raises them.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
