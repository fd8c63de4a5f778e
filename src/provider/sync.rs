//! # Webhook Sync
//!
//! Converges one hook registration onto the desired [`HookOptions`].
//!
//! The stored ID is only a pointer: the hook may have been edited or deleted
//! on GitLab since. A stored ID that no longer resolves is replaced by a new
//! hook. A hook that still exists is edited with the full desired field set on
//! every pass.

use super::{HookOptions, ProviderError, WebhookApi};
use crate::observability::metrics;
use tracing::{debug, info, warn};

/// What [`sync_webhook`] did to reach the desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No hook was recorded; a new one was created
    Created(i64),
    /// The recorded hook was gone; a replacement was created
    Recreated { previous: i64, id: i64 },
    /// The recorded hook exists and was overwritten with the desired fields
    Updated(i64),
}

impl SyncOutcome {
    #[must_use]
    pub fn id(&self) -> i64 {
        match *self {
            SyncOutcome::Created(id) | SyncOutcome::Updated(id) => id,
            SyncOutcome::Recreated { id, .. } => id,
        }
    }

    /// Whether a hook was created on this pass
    #[must_use]
    pub fn created(&self) -> bool {
        !matches!(self, SyncOutcome::Updated(_))
    }
}

/// Make the hook identified by `existing` (if any) match `options`
///
/// # Errors
/// Returns the provider error of the first failing call. A not-found on the
/// initial fetch is handled here and never returned.
pub async fn sync_webhook(
    api: &dyn WebhookApi,
    options: &HookOptions,
    existing: Option<i64>,
) -> Result<SyncOutcome, ProviderError> {
    let Some(previous) = existing else {
        let hook = record("create", api.create(options).await)?;
        info!(hook.id = hook.id, "Created webhook");
        return Ok(SyncOutcome::Created(hook.id));
    };

    match record("get", api.get(previous).await) {
        Ok(hook) => {
            debug!(hook.id = hook.id, hook.url = %hook.url, "Found webhook, updating");
            record("edit", api.edit(previous, options).await)?;
            Ok(SyncOutcome::Updated(previous))
        }
        Err(e) if e.is_not_found() => {
            warn!(
                hook.id = previous,
                "Webhook no longer exists on GitLab, creating a replacement"
            );
            let hook = record("create", api.create(options).await)?;
            info!(hook.id = hook.id, hook.previous_id = previous, "Re-created webhook");
            Ok(SyncOutcome::Recreated {
                previous,
                id: hook.id,
            })
        }
        Err(e) => Err(e),
    }
}

/// Delete a hook; returns `false` when it was already gone
///
/// # Errors
/// Returns any provider error other than not-found.
pub async fn remove_webhook(api: &dyn WebhookApi, id: i64) -> Result<bool, ProviderError> {
    match record("delete", api.delete(id).await) {
        Ok(()) => {
            info!(hook.id = id, "Deleted webhook");
            Ok(true)
        }
        Err(e) if e.is_not_found() => {
            debug!(hook.id = id, "Webhook already deleted");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn record<T>(operation: &str, result: Result<T, ProviderError>) -> Result<T, ProviderError> {
    let outcome = match &result {
        Ok(_) => "success",
        Err(ProviderError::NotFound { .. }) => "not_found",
        Err(ProviderError::Unauthorized { .. }) => "unauthorized",
        Err(_) => "error",
    };
    metrics::record_webhook_operation(operation, outcome);
    result
}
