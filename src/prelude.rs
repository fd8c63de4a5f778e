//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use gitlab_source_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (GitLabSource, GitLabSourceStatus, etc.)
//! - Collaborator traits of the reconciler
//! - Reconciler types (Reconciler, ReconcilerError, etc.)
//! - Config types (ControllerConfig, AdapterConfig)

pub use crate::crd::*;

pub use crate::controller::reconciler::{
    EventPublisher, ReceiverPlatform, SinkResolver,
};
pub use crate::provider::{WebhookApi, WebhookClientFactory};
pub use crate::secret::SecretStore;

pub use crate::controller::reconciler::{
    finalize_source, reconcile, reconcile_source, Context, PassOutcome, Reconciler,
    ReconcilerError, Requeue,
};

pub use crate::config::{AdapterConfig, ControllerConfig};

pub use crate::adapter::{CanonicalEvent, TranslateError, Translator};
