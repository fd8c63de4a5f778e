//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Json
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Receive adapter image (`GL_RA_IMAGE`)
    pub receive_adapter_image: String,
    /// Log filter handed to every receive adapter (`ADAPTER_LOG_LEVEL`)
    pub adapter_log_level: String,
    /// Port for metrics, probes and admission (`METRICS_PORT`)
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// Poll interval while waiting for the HTTP server (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Periodic resync of healthy sources (seconds)
    pub resync_secs: u64,
    /// Requeue interval while a referenced secret is missing (seconds)
    pub credentials_retry_secs: u64,
    /// Timeout of a single GitLab API request (seconds)
    pub provider_timeout_secs: u64,
    /// Reconcile error backoff lower bound (seconds)
    pub error_backoff_min_secs: u64,
    /// Reconcile error backoff upper bound (seconds)
    pub error_backoff_max_secs: u64,
    /// Watch stream backoff start (milliseconds)
    pub backoff_start_ms: u64,
    /// Watch stream backoff cap (milliseconds)
    pub backoff_max_ms: u64,
    /// Delay before restarting the watch after an unknown error (seconds)
    pub watch_restart_delay_secs: u64,
    /// Delay before restarting the watch after it ended (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciliations: u16,
    /// Restrict the watch to one namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Log format (json, text)
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            receive_adapter_image: DEFAULT_RECEIVE_ADAPTER_IMAGE.to_string(),
            adapter_log_level: "info".to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            resync_secs: DEFAULT_RESYNC_SECS,
            credentials_retry_secs: DEFAULT_CREDENTIALS_RETRY_SECS,
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_namespace: None,
            log_format: LogFormat::Json,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            receive_adapter_image: env_var_or_default_str(
                "GL_RA_IMAGE",
                DEFAULT_RECEIVE_ADAPTER_IMAGE,
            ),
            adapter_log_level: env_var_or_default_str("ADAPTER_LOG_LEVEL", "info"),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            server_poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
            resync_secs: env_var_or_default("RESYNC_SECS", DEFAULT_RESYNC_SECS),
            credentials_retry_secs: env_var_or_default(
                "CREDENTIALS_RETRY_SECS",
                DEFAULT_CREDENTIALS_RETRY_SECS,
            ),
            provider_timeout_secs: env_var_or_default(
                "PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            ),
            error_backoff_min_secs: env_var_or_default(
                "ERROR_BACKOFF_MIN_SECS",
                DEFAULT_ERROR_BACKOFF_MIN_SECS,
            ),
            error_backoff_max_secs: env_var_or_default(
                "ERROR_BACKOFF_MAX_SECS",
                DEFAULT_ERROR_BACKOFF_MAX_SECS,
            ),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            watch_namespace: std::env::var("WATCH_NAMESPACE")
                .ok()
                .filter(|ns| !ns.is_empty()),
            log_format: LogFormat::parse(&env_var_or_default_str("LOG_FORMAT", "json")),
        }
    }

    /// Get periodic resync duration
    pub fn resync_duration(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    /// Get requeue duration used while credentials are missing
    pub fn credentials_retry_duration(&self) -> Duration {
        Duration::from_secs(self.credentials_retry_secs)
    }

    /// Get the bounds of the reconcile error backoff
    pub fn error_backoff_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.error_backoff_min_secs),
            Duration::from_secs(self.error_backoff_max_secs),
        )
    }

    /// Get GitLab request timeout
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
