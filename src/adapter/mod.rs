//! # Receive Adapter
//!
//! The process GitLab delivers webhooks to. Each delivery is authenticated,
//! translated into a CloudEvent and forwarded to the sink before GitLab gets
//! its response, so a failed forward surfaces as a failed delivery GitLab can
//! retry.
//!
//! - `translate.rs` - header and payload checks, canonical event derivation
//! - `sender.rs` - CloudEvents HTTP binary-mode delivery
//! - `handler.rs` - axum router
//! - `server.rs` - serving with a bounded shutdown grace period

mod handler;
mod sender;
mod server;
mod translate;

pub use handler::{router, AdapterState};
pub use sender::{EventSender, HttpEventSender, SendError};
pub use server::{serve, shutdown_signal};
pub use translate::{CanonicalEvent, TranslateError, Translator};
