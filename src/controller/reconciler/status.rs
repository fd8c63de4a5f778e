//! # Status
//!
//! Condition reasons and status persistence.

use crate::crd::{GitLabSource, GitLabSourceStatus};
use kube::api::{Api, Patch, PatchParams};
use tracing::debug;

/// Machine-readable condition reasons
pub mod reasons {
    pub const SINK_NOT_FOUND: &str = "SinkNotFound";
    pub const RECEIVE_ADAPTER_CREATE_FAILED: &str = "ReceiveAdapterCreateFailed";
    pub const RECEIVE_ADAPTER_NOT_READY: &str = "ReceiveAdapterNotReady";
    pub const RECEIVE_ADAPTER_NO_ADDRESS: &str = "ReceiveAdapterNoAddress";
    pub const SECRET_NOT_FOUND: &str = "SecretNotFound";
    pub const INVALID_SECRET: &str = "InvalidSecret";
    pub const SECRET_READ_FAILED: &str = "SecretReadFailed";
    pub const ACCESS_DENIED: &str = "AccessDenied";
    pub const WEBHOOK_SYNC_FAILED: &str = "WebhookSyncFailed";
    pub const INVALID_SPEC: &str = "InvalidSpec";
    pub const WEBHOOK_DELETED: &str = "WebhookDeleted";
}

/// Replace the status subresource with `status`
///
/// Unset fields serialize as `null`, so a merge patch clears them.
///
/// # Errors
/// Returns the API error of the patch call.
pub async fn patch_status(
    api: &Api<GitLabSource>,
    name: &str,
    status: &GitLabSourceStatus,
) -> Result<(), kube::Error> {
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    debug!(resource.name = name, "Patched status");
    Ok(())
}
