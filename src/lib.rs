//! GitLab Source Controller Library
//!
//! A Kubernetes controller that keeps a GitLab project or group webhook
//! pointed at a per-source receive adapter, and the receive adapter that
//! turns webhook deliveries into CloudEvents.
//!
//! ## Quick Start
//!
//! ```rust
//! use gitlab_source_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod adapter;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod secret;
