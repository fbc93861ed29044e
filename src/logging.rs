//! Tracing subscriber setup.

use crate::config::{LogFormat, Settings};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG`, when set, always wins over `LOG_LEVEL`.
pub fn init_logging(settings: &Settings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    match settings.log_format {
        LogFormat::Json => {
            let layer = fmt::layer().json().with_target(true);
            registry.with(layer).init();
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_target(false);
            registry.with(layer).init();
        }
    }
}
