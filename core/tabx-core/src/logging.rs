//! Logging setup for TABX.
//!
//! Tables emit `tracing` spans and events on save, commit, import and export.
//! Nothing is printed unless a subscriber is installed; with the `logging`
//! feature these helpers install a `fmt` subscriber scoped to this crate.
//!
//! The filter comes from `TABX_LOG`, then `RUST_LOG`, then the level passed in.

#[cfg(feature = "logging")]
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding a TABX-specific filter directive.
pub const ENV_FILTER: &str = "TABX_LOG";

/// Filter directive for `level` restricted to this crate's targets.
///
/// ```rust
/// assert_eq!(tabx_core::logging::directive("debug"), "tabx_core=debug");
/// ```
pub fn directive(level: &str) -> String {
    format!("tabx_core={}", level.trim().to_ascii_lowercase())
}

/// Install a subscriber at `info` unless the environment says otherwise.
///
/// Safe to call more than once; later calls are ignored.
///
/// ```rust
/// tabx_core::logging::init();
/// ```
pub fn init() {
    init_with_level("info")
}

/// Install a subscriber at `level` (trace, debug, info, warn, error).
#[cfg(feature = "logging")]
pub fn init_with_level(level: &str) {
    let _ = fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// Debug-level subscriber writing through the test harness capture.
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(feature = "logging")]
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(ENV_FILTER)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(directive(level)))
}

#[cfg(not(feature = "logging"))]
pub fn init_with_level(_level: &str) {}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
