//! # Logging
//!
//! Installs the global tracing subscriber. The filter comes from `RUST_LOG`
//! and falls back to `info` for this crate.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "gitlab_source_controller=info,gitlab_receive_adapter=info";

/// Install the global subscriber
///
/// Returns an error when a subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder
            .json()
            .with_current_span(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}")),
        LogFormat::Text => builder
            .with_ansi(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}")),
    }
}
