//! # Webhook Provider
//!
//! Management of the webhook registration on the source-control side.
//!
//! - [`WebhookApi`] is CRUD on one project's or group's hooks
//! - [`WebhookClientFactory`] builds a [`WebhookApi`] for a resolved [`Scope`]
//! - [`sync_webhook`] converges the registration onto the desired options
//!
//! The only implementation is GitLab's REST API in [`gitlab`].

pub mod gitlab;
mod sync;

pub use sync::{remove_webhook, sync_webhook, SyncOutcome};

use crate::crd::Scope;
use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("hook {id} not found")]
    NotFound { id: i64 },
    #[error("access denied by GitLab ({status}): {message}")]
    Unauthorized { status: u16, message: String },
    #[error("GitLab API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("request to GitLab failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid GitLab URL: {0}")]
    InvalidUrl(String),
}

impl ProviderError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Per-category subscription flags of a hook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFlags {
    pub push_events: bool,
    pub tag_push_events: bool,
    pub issues_events: bool,
    pub confidential_issues_events: bool,
    pub note_events: bool,
    pub confidential_note_events: bool,
    pub merge_requests_events: bool,
    pub job_events: bool,
    pub pipeline_events: bool,
    pub wiki_page_events: bool,
    pub deployment_events: bool,
    pub releases_events: bool,
}

impl EventFlags {
    /// Set one flag per recognised category name; unknown names are ignored
    #[must_use]
    pub fn from_categories<S: AsRef<str>>(categories: &[S]) -> Self {
        let mut flags = Self::default();
        for category in categories {
            match category.as_ref() {
                "push_events" => flags.push_events = true,
                "tag_push_events" => flags.tag_push_events = true,
                "issues_events" => flags.issues_events = true,
                "confidential_issues_events" => flags.confidential_issues_events = true,
                "note_events" => flags.note_events = true,
                "confidential_note_events" => flags.confidential_note_events = true,
                "merge_requests_events" => flags.merge_requests_events = true,
                "job_events" => flags.job_events = true,
                "pipeline_events" => flags.pipeline_events = true,
                "wiki_page_events" => flags.wiki_page_events = true,
                "deployment_events" => flags.deployment_events = true,
                "releases_events" => flags.releases_events = true,
                other => tracing::debug!(category = other, "Ignoring unrecognised webhook category"),
            }
        }
        flags
    }
}

/// Full desired field set of a hook
#[derive(Clone, PartialEq, Eq)]
pub struct HookOptions {
    pub url: String,
    pub token: Zeroizing<String>,
    pub enable_ssl_verification: bool,
    pub events: EventFlags,
}

impl std::fmt::Debug for HookOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookOptions")
            .field("url", &self.url)
            .field("token", &"***")
            .field("enable_ssl_verification", &self.enable_ssl_verification)
            .field("events", &self.events)
            .finish()
    }
}

impl HookOptions {
    pub fn new<S: AsRef<str>>(
        url: impl Into<String>,
        token: Zeroizing<String>,
        enable_ssl_verification: bool,
        categories: &[S],
    ) -> Self {
        Self {
            url: url.into(),
            token,
            enable_ssl_verification,
            events: EventFlags::from_categories(categories),
        }
    }
}

/// A hook as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    pub id: i64,
    pub url: String,
}

/// CRUD on the hooks of one project or group
#[async_trait]
pub trait WebhookApi: Send + Sync {
    async fn get(&self, id: i64) -> Result<Hook, ProviderError>;

    async fn create(&self, options: &HookOptions) -> Result<Hook, ProviderError>;

    async fn edit(&self, id: i64, options: &HookOptions) -> Result<Hook, ProviderError>;

    async fn delete(&self, id: i64) -> Result<(), ProviderError>;
}

/// Builds an authenticated [`WebhookApi`] for a scope
pub trait WebhookClientFactory: Send + Sync {
    /// # Errors
    /// Fails when the scope's URL cannot be turned into an API endpoint.
    fn client(&self, scope: &Scope, access_token: &str) -> Result<Box<dyn WebhookApi>, ProviderError>;
}
