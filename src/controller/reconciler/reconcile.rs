//! # Reconcile
//!
//! One reconciliation pass over a GitLabSource.
//!
//! A pass is level-triggered: it re-reads everything it depends on and
//! converges the receive adapter and the GitLab hook regardless of what the
//! previous pass did. [`reconcile_source`] computes the new status without
//! writing to the API server; [`reconcile`] is the controller entry point that
//! adds the finalizer and persists the status.

use crate::constants::FINALIZER_NAME;
use crate::controller::reconciler::events::{actions, reasons as event_reasons};
use crate::controller::reconciler::finalize::finalize_source;
use crate::controller::reconciler::receiver::{receiver_spec, Receiver};
use crate::controller::reconciler::status::{patch_status, reasons};
use crate::controller::reconciler::types::{
    resource_key, Context, PassOutcome, Reconciler, ReconcilerError, Requeue,
};
use crate::crd::{
    event_types, validate, CloudEventAttributes, ConditionManager, GitLabSource,
    GitLabSourceStatus, CONDITION_DEPLOYED, CONDITION_SINK_PROVIDED,
    CONDITION_WEBHOOK_CONFIGURED, GITLAB_SOURCE_CONDITIONS,
};
use crate::observability::metrics;
use crate::provider::{sync_webhook, HookOptions};
use crate::secret::{CredentialError, CredentialResolver};
use chrono::{DateTime, Utc};
use kube::api::Api;
use kube_runtime::controller::Action;
use kube_runtime::events::EventType;
use kube_runtime::finalizer::{finalizer, Event as FinalizerEvent};
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

/// Status being built by a pass
struct PassStatus<'a> {
    status: &'a mut GitLabSourceStatus,
    now: DateTime<Utc>,
}

impl PassStatus<'_> {
    fn conditions(&mut self) -> ConditionManager<'_> {
        ConditionManager::new(&GITLAB_SOURCE_CONDITIONS, &mut self.status.conditions, self.now)
    }
}

/// Resolved tokens of a source
struct Credentials {
    access_token: Zeroizing<String>,
    secret_token: Zeroizing<String>,
}

/// Run one pass and return the status it arrived at
///
/// Never writes to the API server. Problems that only an external change can
/// fix are recorded on a condition and come back as `Ok`; an `Err` asks for a
/// retry with backoff.
pub async fn reconcile_source(ctx: &Context, source: &GitLabSource) -> PassOutcome {
    let span = info_span!(
        "reconcile.pass",
        resource.name = %source.name_any(),
        resource.namespace = source.metadata.namespace.as_deref().unwrap_or_default(),
        resource.generation = source.metadata.generation.unwrap_or_default(),
    );
    let mut status = source.status.clone().unwrap_or_default();
    let result = {
        let mut pass = PassStatus {
            status: &mut status,
            now: Utc::now(),
        };
        pass.conditions().initialize();
        run_pass(ctx, source, &mut pass).instrument(span).await
    };
    status.observed_generation = source.metadata.generation;
    PassOutcome { status, result }
}

async fn run_pass(
    ctx: &Context,
    source: &GitLabSource,
    pass: &mut PassStatus<'_>,
) -> Result<Requeue, ReconcilerError> {
    let namespace = source.namespace().unwrap_or_default();

    if let Err(e) = validate(&source.spec).and_then(|()| source.scope().map(|_| ())) {
        warn!(error = %e, "GitLabSource is invalid, waiting for a change");
        pass.conditions()
            .mark_false(CONDITION_WEBHOOK_CONFIGURED, reasons::INVALID_SPEC, e.to_string());
        return Ok(Requeue::AwaitChange);
    }
    pass.status.ce_attributes = ce_attributes(source);

    // 1. Sink
    let sink_uri = match ctx.sinks.resolve(&namespace, &source.spec.sink).await {
        Ok(uri) => uri,
        Err(e) if e.is_transient() => return Err(e.into()),
        Err(e) => {
            info!(error = %e, "Sink not resolvable yet");
            pass.status.sink_uri = None;
            pass.conditions()
                .mark_false(CONDITION_SINK_PROVIDED, reasons::SINK_NOT_FOUND, e.to_string());
            return Ok(Requeue::Resync);
        }
    };
    pass.status.sink_uri = Some(sink_uri.clone());
    pass.conditions().mark_true(CONDITION_SINK_PROVIDED);

    // 2. Receive adapter, found by owner
    let receiver = match owned_receiver(ctx, source, &namespace).await? {
        Some(receiver) => receiver,
        None => match create_receiver(ctx, source, &sink_uri).await {
            Ok(receiver) => receiver,
            Err(e) => {
                pass.conditions().mark_false(
                    CONDITION_DEPLOYED,
                    reasons::RECEIVE_ADAPTER_CREATE_FAILED,
                    format!("{e:#}"),
                );
                return Err(ReconcilerError::Receiver(e));
            }
        },
    };

    // 3. Readiness
    if !receiver.ready {
        debug!(receiver.name = %receiver.name, "Receive adapter not ready");
        pass.conditions().mark_false(
            CONDITION_DEPLOYED,
            reasons::RECEIVE_ADAPTER_NOT_READY,
            format!("receive adapter {} is not ready", receiver.name),
        );
        return Ok(Requeue::Resync);
    }

    // 4. Address
    pass.conditions().mark_true(CONDITION_DEPLOYED);
    let Some(address) = receiver.address else {
        pass.conditions().mark_unknown(
            CONDITION_WEBHOOK_CONFIGURED,
            reasons::RECEIVE_ADAPTER_NO_ADDRESS,
            format!("receive adapter {} has no address yet", receiver.name),
        );
        return Ok(Requeue::Resync);
    };

    // 5. Credentials
    let credentials = match resolve_credentials(ctx, source, &namespace).await {
        Ok(credentials) => credentials,
        Err(e) if e.is_missing() => {
            warn!(error = %e, "Credentials not available");
            pass.conditions()
                .mark_false(CONDITION_WEBHOOK_CONFIGURED, reasons::SECRET_NOT_FOUND, e.to_string());
            publish(ctx, source, EventType::Warning, event_reasons::SECRET_NOT_FOUND, e.to_string())
                .await;
            return Ok(Requeue::After(ctx.config.credentials_retry_duration()));
        }
        Err(e @ CredentialError::InvalidEncoding { .. }) => {
            warn!(error = %e, "Credentials are unusable");
            pass.conditions()
                .mark_false(CONDITION_WEBHOOK_CONFIGURED, reasons::INVALID_SECRET, e.to_string());
            publish(ctx, source, EventType::Warning, event_reasons::INVALID_SECRET, e.to_string())
                .await;
            return Ok(Requeue::After(ctx.config.credentials_retry_duration()));
        }
        Err(e) => {
            pass.conditions().mark_false(
                CONDITION_WEBHOOK_CONFIGURED,
                reasons::SECRET_READ_FAILED,
                e.to_string(),
            );
            return Err(e.into());
        }
    };

    // 6. Webhook
    let scope = source.scope()?;
    let options = HookOptions::new(
        address,
        credentials.secret_token,
        source.spec.ssl_verify,
        &source.spec.event_types,
    );
    let synced = match ctx.webhooks.client(&scope, &credentials.access_token) {
        Ok(api) => sync_webhook(&*api, &options, pass.status.webhook_id).await,
        Err(e) => Err(e),
    };
    match synced {
        Ok(outcome) => {
            pass.status.webhook_id = Some(outcome.id());
            pass.conditions().mark_true(CONDITION_WEBHOOK_CONFIGURED);
            // 7. Announce creations, not edits
            if outcome.created() {
                publish(
                    ctx,
                    source,
                    EventType::Normal,
                    event_reasons::WEBHOOK_CREATED,
                    format!("Created webhook {} on {}", outcome.id(), scope.path()),
                )
                .await;
            }
            Ok(Requeue::Resync)
        }
        Err(e) if e.is_unauthorized() => {
            warn!(error = %e, "GitLab denied access");
            pass.conditions()
                .mark_false(CONDITION_WEBHOOK_CONFIGURED, reasons::ACCESS_DENIED, e.to_string());
            publish(ctx, source, EventType::Warning, event_reasons::ACCESS_DENIED, e.to_string())
                .await;
            Ok(Requeue::Resync)
        }
        Err(e) => {
            pass.conditions().mark_false(
                CONDITION_WEBHOOK_CONFIGURED,
                reasons::WEBHOOK_SYNC_FAILED,
                e.to_string(),
            );
            Err(e.into())
        }
    }
}

fn ce_attributes(source: &GitLabSource) -> Vec<CloudEventAttributes> {
    let event_source = source.event_source();
    event_types(&source.spec.event_types)
        .into_iter()
        .map(|r#type| CloudEventAttributes {
            r#type,
            source: event_source.clone(),
        })
        .collect()
}

async fn owned_receiver(
    ctx: &Context,
    source: &GitLabSource,
    namespace: &str,
) -> Result<Option<Receiver>, ReconcilerError> {
    let Some(uid) = source.metadata.uid.as_deref() else {
        return Ok(None);
    };
    let receivers = ctx
        .receivers
        .list(namespace)
        .await
        .map_err(ReconcilerError::Receiver)?;
    Ok(receivers.into_iter().find(|r| r.is_controlled_by(uid)))
}

async fn create_receiver(
    ctx: &Context,
    source: &GitLabSource,
    sink_uri: &str,
) -> anyhow::Result<Receiver> {
    let spec = receiver_spec(source, sink_uri, &ctx.config)?;
    let receiver = ctx.receivers.create(&spec).await?;
    metrics::increment_receive_adapters_created();
    publish(
        ctx,
        source,
        EventType::Normal,
        event_reasons::RECEIVE_ADAPTER_CREATED,
        format!("Created receive adapter {}", receiver.name),
    )
    .await;
    Ok(receiver)
}

/// Resolve the access token and the optional secret token with one resolver
async fn resolve_credentials(
    ctx: &Context,
    source: &GitLabSource,
    namespace: &str,
) -> Result<Credentials, CredentialError> {
    let mut resolver = CredentialResolver::new(Arc::clone(&ctx.secrets), namespace);
    let refs = [
        Some(&source.spec.access_token.secret_key_ref),
        source.spec.secret_token.as_ref().map(|s| &s.secret_key_ref),
    ];
    let mut values = resolver.resolve_all(&refs).await?.into_iter();
    let mut next = || values.next().unwrap_or_else(|| Zeroizing::new(String::new()));
    Ok(Credentials {
        access_token: next(),
        secret_token: next(),
    })
}

pub(crate) async fn publish(
    ctx: &Context,
    source: &GitLabSource,
    type_: EventType,
    reason: &str,
    note: String,
) {
    let action = if source.meta().deletion_timestamp.is_some() {
        actions::FINALIZE
    } else {
        actions::RECONCILE
    };
    ctx.events
        .publish(&source.object_ref(&()), type_, reason, action, Some(note))
        .await;
}

/// Controller entry point
///
/// # Errors
/// Returns the pass error, a status patch error, or a finalizer error; the
/// error policy turns these into a backoff.
pub async fn reconcile(
    source: Arc<GitLabSource>,
    reconciler: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    metrics::increment_reconciliations();

    let namespace = source.namespace().unwrap_or_default();
    let api: Api<GitLabSource> = Api::namespaced(reconciler.client.clone(), &namespace);
    let reconciler = reconciler.as_ref();
    let api_ref = &api;

    let result = finalizer(api_ref, FINALIZER_NAME, source, |event| async move {
        match event {
            FinalizerEvent::Apply(source) => apply(reconciler, api_ref, &source).await,
            FinalizerEvent::Cleanup(source) => cleanup(reconciler, api_ref, &source).await,
        }
    })
    .await
    .map_err(|e| ReconcilerError::Finalizer(Box::new(e)));

    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    result
}

async fn apply(
    reconciler: &Reconciler,
    api: &Api<GitLabSource>,
    source: &GitLabSource,
) -> Result<Action, ReconcilerError> {
    let name = source.name_any();
    let outcome = reconcile_source(&reconciler.context, source).await;

    if source.status.as_ref() != Some(&outcome.status) {
        patch_status(api, &name, &outcome.status).await?;
    }

    let requeue = outcome.result?;
    let key = resource_key(&source.namespace().unwrap_or_default(), &name);
    if reconciler.reset_backoff(&key) {
        info!(resource.name = %name, "Backoff reset after a successful pass");
    }

    metrics::increment_requeues_total(requeue.as_str());
    let action = match requeue {
        Requeue::Resync => Action::requeue(reconciler.context.config.resync_duration()),
        Requeue::After(delay) => Action::requeue(delay),
        Requeue::AwaitChange => Action::await_change(),
    };
    info!(
        resource.name = %name,
        ready = outcome.status.is_ready(),
        requeue = requeue.as_str(),
        "Reconciliation complete"
    );
    Ok(action)
}

async fn cleanup(
    reconciler: &Reconciler,
    api: &Api<GitLabSource>,
    source: &GitLabSource,
) -> Result<Action, ReconcilerError> {
    let name = source.name_any();
    let status = finalize_source(&reconciler.context, source).await?;
    if source.status.as_ref() != Some(&status) {
        if let Err(e) = patch_status(api, &name, &status).await {
            warn!(resource.name = %name, error = %e, "Failed to record finalization in status");
        }
    }
    Ok(Action::await_change())
}
