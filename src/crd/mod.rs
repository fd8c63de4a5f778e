//! # Custom Resource Definitions
//!
//! CRD types for the GitLab source controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `GitLabSourceSpec`, scope resolution and references
//! - `status.rs` - Status, conditions and the condition set of the resource
//! - `event_types.rs` - Mapping between GitLab hook categories and CloudEvent types
//! - `validation.rs` - Admission rules for `GitLabSourceSpec`

mod event_types;
mod spec;
mod status;
mod validation;

pub use event_types::{
    canonical_type_for_category, category_from_header, event_type, event_types,
    is_known_event_type,
};
pub use spec::{
    Destination, GitLabSource, GitLabSourceSpec, KReference, Scope, SecretKeySelector,
    SecretValueFromSource,
};
pub use status::{
    CloudEventAttributes, Condition, ConditionDef, ConditionManager, ConditionSet,
    GitLabSourceStatus, CONDITION_DEPLOYED, CONDITION_READY, CONDITION_SINK_PROVIDED,
    CONDITION_WEBHOOK_CONFIGURED, GITLAB_SOURCE_CONDITIONS,
};
pub use validation::{validate, ValidationError};
