//! Structured logging setup for the driver binaries.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// The filter to run with: `RUST_LOG` if set and valid, otherwise the
/// configured level.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
