//! Telemetry logic.
//! Logging only; this system has no metrics or trace export surface.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global `tracing` subscriber for embedding applications.
///
/// Reads `RUST_LOG` when set. Safe to call more than once; later calls are
/// ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
