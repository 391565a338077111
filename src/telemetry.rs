//! Tracing initialization.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber: env-filtered, `info` by default. Raw
/// line traffic logs at `trace`, protocol drops at `debug`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
}
