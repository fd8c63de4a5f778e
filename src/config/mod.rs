//! # Configuration
//!
//! Process configuration for the controller and the receive adapter.
//!
//! - [`ControllerConfig`] is read from environment variables with defaults from
//!   [`crate::constants`]. The deployment populates them from a ConfigMap via `envFrom`.
//! - [`AdapterConfig`] is parsed with clap so a missing required value stops the
//!   receive adapter before it binds its socket.

mod adapter;
mod controller;

pub use adapter::AdapterConfig;
pub use controller::{ControllerConfig, LogFormat};
