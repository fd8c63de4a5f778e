//! # Receive Adapter Configuration
//!
//! The receive adapter is configured entirely from its environment, which the
//! controller wires into the receiver service it creates.

use clap::Parser;
use std::time::Duration;

/// Receive adapter settings
///
/// `GITLAB_EVENT_SOURCE` and `K_SINK` are required. Parsing fails at startup
/// when either is missing or when the sink is not an absolute URL.
#[derive(Clone, Parser)]
#[command(name = "gitlab-receive-adapter", version, about = "Translates GitLab webhooks into CloudEvents")]
pub struct AdapterConfig {
    /// Port to listen on for webhook deliveries
    #[arg(long, env = "PORT", default_value_t = crate::constants::DEFAULT_ADAPTER_PORT)]
    pub port: u16,

    /// Shared secret GitLab sends in `X-Gitlab-Token`; empty disables the check
    #[arg(long, env = "GITLAB_SECRET_TOKEN", default_value = "", hide_env_values = true)]
    pub secret_token: String,

    /// Canonical source identity (the project or group URL)
    #[arg(long, env = "GITLAB_EVENT_SOURCE")]
    pub event_source: String,

    /// Where translated events are delivered
    #[arg(long, env = "K_SINK", value_parser = parse_sink)]
    pub sink: reqwest::Url,

    /// Namespace of the owning GitLabSource
    #[arg(long, env = "NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Port for the adapter's Prometheus endpoint
    #[arg(long, env = "METRICS_PROMETHEUS_PORT", default_value_t = crate::constants::DEFAULT_ADAPTER_METRICS_PORT)]
    pub metrics_port: u16,

    /// Grace period for in-flight deliveries on shutdown (seconds)
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = crate::constants::DEFAULT_ADAPTER_SHUTDOWN_GRACE_SECS)]
    pub shutdown_grace_secs: u64,

    /// Timeout for delivering one event to the sink (seconds)
    #[arg(long, env = "SINK_TIMEOUT_SECS", default_value_t = crate::constants::DEFAULT_SINK_TIMEOUT_SECS)]
    pub sink_timeout_secs: u64,
}

impl std::fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("port", &self.port)
            .field("secret_token", &"***")
            .field("event_source", &self.event_source)
            .field("sink", &self.sink.as_str())
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl AdapterConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.sink_timeout_secs)
    }
}

fn parse_sink(value: &str) -> Result<reqwest::Url, String> {
    let url = reqwest::Url::parse(value).map_err(|e| format!("invalid sink URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported sink scheme: {other}")),
    }
}
