//! Tracing setup helpers.
//!
//! The crate itself only emits `tracing` events; installing a subscriber is
//! the host application's call. These helpers cover the common case: a
//! compact stderr formatter filtered through `RUST_LOG`.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a stderr subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops. Returns whether
/// this call installed the global subscriber.
pub fn init() -> bool {
    init_with_filter("info")
}

/// Like [`init`], with an explicit fallback directive used when `RUST_LOG`
/// is unset.
pub fn init_with_filter(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .is_ok()
}
