//! # Runtime
//!
//! Controller process wiring.
//!
//! - `initialization`: crypto provider, tracing, metrics, HTTP server, client and reconciler
//! - `watch_loop`: the kube-runtime controller and its restart loop
//! - `error_policy`: reconcile error backoff and watch error classification

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
