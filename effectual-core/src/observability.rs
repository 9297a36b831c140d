//! Tracing initialization

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Initialize tracing with JSON formatting.
///
/// The filter comes from the configured log level; `RUST_LOG` still wins when
/// set. Calling this twice is harmless: the second call leaves the installed
/// subscriber in place.
pub fn init_tracing(config: &Config) {
    let log_level = config.service.log_level.clone();

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    tracing::info!(
        service = %config.service.name,
        environment = %config.service.environment,
        "tracing initialized"
    );
}
