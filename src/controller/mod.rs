//! # Controller
//!
//! Core controller modules for the GitLab source controller.
//!
//! - `admission`: validating admission webhook for GitLabSource
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics, health checks and admission

pub mod admission;
pub mod backoff;
pub mod reconciler;
pub mod server;
