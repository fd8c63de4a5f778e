//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::constants::CONTROLLER_NAME;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::events::{EventPublisher, KubeEventPublisher};
use crate::controller::reconciler::receiver::{KnativeReceiverPlatform, ReceiverPlatform};
use crate::controller::reconciler::sink::{KubeSinkResolver, SinkError, SinkResolver};
use crate::crd::{GitLabSourceStatus, ValidationError};
use crate::provider::gitlab::GitLabClientFactory;
use crate::provider::{ProviderError, WebhookClientFactory};
use crate::secret::{CredentialError, KubeSecretStore, SecretStore};
use kube_runtime::finalizer;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("Invalid GitLabSource: {0}")]
    Validation(#[from] ValidationError),
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),
    #[error("GitLab API error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Sink resolution failed: {0}")]
    Sink(#[from] SinkError),
    #[error("Receive adapter error: {0}")]
    Receiver(#[source] anyhow::Error),
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<finalizer::Error<ReconcilerError>>),
}

/// When to look at a source again after a pass that absorbed its problems
/// into status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Periodic resync
    Resync,
    /// A shorter retry, e.g. while a Secret is missing
    After(Duration),
    /// Nothing will change until the object does
    AwaitChange,
}

impl Requeue {
    /// Label of the requeue metric
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Requeue::Resync => "resync",
            Requeue::After(_) => "retry-after",
            Requeue::AwaitChange => "await-change",
        }
    }
}

/// Result of one reconciliation pass
///
/// `status` is always the status to persist, also when `result` is an error.
#[derive(Debug)]
pub struct PassOutcome {
    pub status: GitLabSourceStatus,
    pub result: Result<Requeue, ReconcilerError>,
}

/// Collaborators of a reconciliation pass
///
/// Every external system sits behind a trait so passes can run against
/// in-memory fakes.
#[derive(Clone)]
pub struct Context {
    pub secrets: Arc<dyn SecretStore>,
    pub webhooks: Arc<dyn WebhookClientFactory>,
    pub receivers: Arc<dyn ReceiverPlatform>,
    pub sinks: Arc<dyn SinkResolver>,
    pub events: Arc<dyn EventPublisher>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min, max),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub context: Context,
    // Backoff state per resource (identified by namespace/name), owned by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Wire the production collaborators
    ///
    /// # Errors
    /// Fails when the GitLab HTTP client cannot be built.
    pub fn new(client: Client, config: ControllerConfig) -> Result<Self, ReconcilerError> {
        let webhooks = GitLabClientFactory::new(config.provider_timeout())?;
        let context = Context {
            secrets: Arc::new(KubeSecretStore::new(client.clone())),
            webhooks: Arc::new(webhooks),
            receivers: Arc::new(KnativeReceiverPlatform::new(client.clone())),
            sinks: Arc::new(KubeSinkResolver::new(client.clone())),
            events: Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME)),
            config,
        };
        Ok(Self::with_context(client, context))
    }

    pub fn with_context(client: Client, context: Context) -> Self {
        Self {
            client,
            context,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget accumulated errors of a resource; returns whether it was backing off
    pub fn reset_backoff(&self, resource_key: &str) -> bool {
        let Ok(mut states) = self.backoff_states.lock() else {
            return false;
        };
        match states.get_mut(resource_key) {
            Some(state) => {
                let had_errors = state.error_count > 0;
                state.reset();
                had_errors
            }
            None => false,
        }
    }

    /// Record one more failure of a resource and get the delay before retrying
    pub fn next_error_backoff(&self, resource_key: &str) -> (Duration, u32) {
        let (min, max) = self.context.config.error_backoff_bounds();
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(|| BackoffState::new(min, max));
                state.increment_error();
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                tracing::warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (min, 0)
            }
        }
    }
}

/// Key identifying a resource in per-resource maps
pub(crate) fn resource_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}
