//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{resource_key, Reconciler, ReconcilerError};
use crate::crd::GitLabSource;
use crate::observability;
use kube_runtime::controller::Action;
use kube::ResourceExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing source does not slow
/// down the others.
pub fn handle_reconciliation_error(
    source: Arc<GitLabSource>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = source.name_any();
    let namespace = source.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", name, error);
    observability::metrics::increment_reconciliation_errors();

    let (backoff, error_count) = ctx.next_error_backoff(&resource_key(&namespace, &name));
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(60));

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}), next attempt at {}",
        backoff.as_secs(),
        error_count,
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(backoff)
}

/// Classification of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    Expired,
    Throttled,
    NotFound,
    Other,
}

impl WatchErrorKind {
    /// Classify a formatted controller error
    ///
    /// 404 is checked before 401: a plain-text 404 surfaces as a serde error
    /// that also mentions `WatchFailed`.
    #[must_use]
    pub fn classify(error_string: &str) -> Self {
        let is_not_found = error_string.contains("ObjectNotFound")
            || error_string.contains("404")
            || error_string.contains("not found");
        if (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found {
            Self::Unauthorized
        } else if error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone")
        {
            Self::Expired
        } else if error_string.contains("429")
            || error_string.contains("storage is (re)initializing")
            || error_string.contains("TooManyRequests")
        {
            Self::Throttled
        } else if is_not_found {
            Self::NotFound
        } else {
            Self::Other
        }
    }
}

/// Handle watch stream errors with appropriate classification and backoff
///
/// Returns `None` to filter out the error (allow restart) or `Some(())` to continue.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    async move {
        match WatchErrorKind::classify(error_string) {
            WatchErrorKind::Unauthorized => {
                error!(
                    "Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
                );
                error!("Verify the ClusterRole and ClusterRoleBinding of gitlab-source-controller grant list/watch on gitlabsources.sources.knative.dev and services.serving.knative.dev");
                warn!(
                    "Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                    watch_restart_delay_secs
                );
                tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
                None
            }
            WatchErrorKind::Expired => {
                warn!(error_type = "410", "Watch resource version expired, watch will restart");
                None
            }
            WatchErrorKind::Throttled => {
                let current_backoff = backoff.load(Ordering::Relaxed);
                warn!(
                    "API server storage reinitializing (429), backing off for {}ms before restart...",
                    current_backoff
                );
                tokio::time::sleep(Duration::from_millis(current_backoff)).await;
                let new_backoff = current_backoff.saturating_mul(2).min(max_backoff_ms);
                backoff.store(new_backoff, Ordering::Relaxed);
                None
            }
            WatchErrorKind::NotFound => {
                warn!(
                    "Resource not found (404) - normal for deleted objects, check the CRD is installed if it persists. Error: {}",
                    error_string
                );
                Some(())
            }
            WatchErrorKind::Other => {
                error!("Controller stream error: {}", error_string);
                tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
                None
            }
        }
    }
    .instrument(error_span)
    .await
}
