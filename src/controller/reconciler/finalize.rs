//! # Finalize
//!
//! Removes the GitLab hook of a GitLabSource that is being deleted.
//!
//! Finalization must not block deletion forever. When the hook cannot be
//! deleted because credentials are gone or GitLab denies access, the hook is
//! abandoned: a Warning event records it and deletion proceeds. Every other
//! failure is returned and retried.

use crate::controller::reconciler::events::reasons as event_reasons;
use crate::controller::reconciler::reconcile::publish;
use crate::controller::reconciler::status::reasons;
use crate::controller::reconciler::types::{Context, ReconcilerError};
use crate::crd::{
    ConditionManager, GitLabSource, GitLabSourceStatus, CONDITION_WEBHOOK_CONFIGURED,
    GITLAB_SOURCE_CONDITIONS,
};
use crate::provider::{remove_webhook, ProviderError};
use crate::secret::CredentialResolver;
use chrono::Utc;
use kube_runtime::events::EventType;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Delete the recorded hook and return the status to persist
///
/// A source without a recorded hook is left untouched.
///
/// # Errors
/// Returns retryable failures: store errors, transport errors and GitLab
/// errors other than not-found and access denied.
pub async fn finalize_source(
    ctx: &Context,
    source: &GitLabSource,
) -> Result<GitLabSourceStatus, ReconcilerError> {
    let mut status = source.status.clone().unwrap_or_default();
    let Some(id) = status.webhook_id else {
        return Ok(status);
    };

    let span = info_span!(
        "reconcile.finalize",
        resource.name = %source.name_any(),
        hook.id = id,
    );
    let message = match delete_hook(ctx, source, id).instrument(span).await? {
        None => format!("webhook {id} deleted"),
        Some(abandoned) => {
            warn!(hook.id = id, reason = %abandoned, "Abandoning webhook on GitLab");
            publish(
                ctx,
                source,
                EventType::Warning,
                event_reasons::WEBHOOK_ABANDONED,
                format!("Webhook {id} was left on GitLab: {abandoned}"),
            )
            .await;
            format!("webhook {id} abandoned: {abandoned}")
        }
    };

    status.webhook_id = None;
    let mut conditions = ConditionManager::new(&GITLAB_SOURCE_CONDITIONS, &mut status.conditions, Utc::now());
    conditions.initialize();
    conditions.mark_false(CONDITION_WEBHOOK_CONFIGURED, reasons::WEBHOOK_DELETED, message);
    Ok(status)
}

/// `Some(reason)` when the hook has to be abandoned
async fn delete_hook(
    ctx: &Context,
    source: &GitLabSource,
    id: i64,
) -> Result<Option<String>, ReconcilerError> {
    let scope = match source.scope() {
        Ok(scope) => scope,
        Err(e) => return Ok(Some(e.to_string())),
    };
    let namespace = source.namespace().unwrap_or_default();
    let mut resolver = CredentialResolver::new(Arc::clone(&ctx.secrets), namespace);
    let access_token = match resolver.resolve(&source.spec.access_token.secret_key_ref).await {
        Ok(token) => token,
        Err(e) if e.is_missing() => return Ok(Some(e.to_string())),
        Err(e) => return Err(e.into()),
    };

    let api = match ctx.webhooks.client(&scope, &access_token) {
        Ok(api) => api,
        Err(e @ ProviderError::InvalidUrl(_)) => return Ok(Some(e.to_string())),
        Err(e) => return Err(e.into()),
    };
    match remove_webhook(&*api, id).await {
        Ok(deleted) => {
            if deleted {
                info!(hook.id = id, "Removed webhook during finalization");
            }
            Ok(None)
        }
        Err(e) if e.is_unauthorized() => Ok(Some(e.to_string())),
        Err(e) => Err(e.into()),
    }
}
