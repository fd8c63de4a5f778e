//! # Observability
//!
//! Observability modules for metrics and logging.
//!
//! - `metrics`: Prometheus metrics collection
//! - `logging`: tracing subscriber setup
//! - `http`: `/metrics` and `/healthz` handlers shared by both processes

pub mod http;
pub mod logging;
pub mod metrics;
