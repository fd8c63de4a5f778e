//! # Reconciler
//!
//! Reconciliation of GitLabSource resources.
//!
//! - `reconcile`: the pass and the controller entry point
//! - `finalize`: hook removal on deletion
//! - `receiver`: receive adapter discovery and creation
//! - `sink`: sink resolution
//! - `events`: Kubernetes Events
//! - `status`: condition reasons and status persistence
//! - `types`: errors, collaborators and per-resource state

pub mod events;
mod finalize;
pub mod receiver;
mod reconcile;
pub mod sink;
pub mod status;
mod types;

pub use events::{EventPublisher, KubeEventPublisher};
pub use finalize::finalize_source;
pub use receiver::{
    knative_service_resource, receiver_spec, KnativeReceiverPlatform, Receiver, ReceiverPlatform,
    ReceiverSpec,
};
pub use reconcile::{reconcile, reconcile_source};
pub use sink::{KubeSinkResolver, SinkError, SinkResolver};
pub use status::patch_status;
pub use types::{BackoffState, Context, PassOutcome, Reconciler, ReconcilerError, Requeue};
pub(crate) use types::resource_key;
