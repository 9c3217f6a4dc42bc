//! Log output for the library and the CLI.
//!
//! Library code only emits `tracing` events. Installing a subscriber is
//! left to the binary (or to an embedding application).

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Builds the level filter: `RUST_LOG` wins over the configured level.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a stderr fmt subscriber.
///
/// Returns false when a global subscriber was already set, in which case
/// the existing one stays in place.
pub fn init(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
