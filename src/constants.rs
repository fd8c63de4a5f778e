//! # Constants
//!
//! Shared constants used throughout the controller and the receive adapter.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics, health probes and admission
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default periodic resync interval for a healthy GitLabSource (seconds)
pub const DEFAULT_RESYNC_SECS: u64 = 300;

/// Default requeue interval while a referenced secret is missing (seconds)
pub const DEFAULT_CREDENTIALS_RETRY_SECS: u64 = 30;

/// Default timeout for a single GitLab API request (seconds)
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Default exponential backoff starting value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Lower bound of the per-resource reconcile error backoff (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 60;

/// Upper bound of the per-resource reconcile error backoff (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 600;

/// Default maximum number of concurrent reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default receive adapter image
pub const DEFAULT_RECEIVE_ADAPTER_IMAGE: &str =
    "ghcr.io/microscaler/gitlab-receive-adapter:latest";

/// Finalizer placed on every GitLabSource so the remote hook can be removed
pub const FINALIZER_NAME: &str = "gitlabsources.sources.knative.dev";

/// Field manager and event reporter name
pub const CONTROLLER_NAME: &str = "gitlab-source-controller";

/// Label put on every receive adapter service
pub const RECEIVE_ADAPTER_LABEL_KEY: &str = "receive-adapter";

/// Value of [`RECEIVE_ADAPTER_LABEL_KEY`]
pub const RECEIVE_ADAPTER_LABEL_VALUE: &str = "gitlab";

/// Prefix of every CloudEvent type emitted by a GitLabSource
pub const EVENT_TYPE_PREFIX: &str = "dev.knative.sources.gitlab";

/// Header carrying the GitLab event category, e.g. `Push Hook`
pub const GITLAB_EVENT_HEADER: &str = "X-Gitlab-Event";

/// Header carrying the shared webhook secret
pub const GITLAB_TOKEN_HEADER: &str = "X-Gitlab-Token";

/// CloudEvent extension attribute holding the original event header
pub const EVENT_HEADER_EXTENSION: &str = "event";

/// Metrics domain handed to the receive adapter
pub const ADAPTER_METRICS_DOMAIN: &str = "knative.dev/eventing";

/// Prometheus port of the receive adapter
pub const DEFAULT_ADAPTER_METRICS_PORT: u16 = 9092;

/// Port the receive adapter listens on for webhook deliveries
pub const DEFAULT_ADAPTER_PORT: u16 = 8080;

/// Grace period for in-flight webhook deliveries on shutdown (seconds)
pub const DEFAULT_ADAPTER_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Timeout for delivering one CloudEvent to the sink (seconds)
pub const DEFAULT_SINK_TIMEOUT_SECS: u64 = 10;
