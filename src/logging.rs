//! Logging setup
//!
//! `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` emits one JSON
//! object per line for Cloud Logging.

use crate::types::LogFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).try_init(),
    };

    if let Err(e) = result {
        tracing::debug!("Logging already initialised: {}", e);
    }
}

/// Log format from `LOG_FORMAT`, falling back to text
pub fn format_from_env() -> LogFormat {
    std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}
