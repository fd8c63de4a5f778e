//! # Event Sender
//!
//! Delivers [`CanonicalEvent`]s to the sink using the CloudEvents HTTP
//! protocol binding in binary mode: attributes travel as `ce-` headers and the
//! payload is the request body, untouched.

use super::CanonicalEvent;
use crate::constants::EVENT_HEADER_EXTENSION;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to reach sink: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sink responded with {status}")]
    Rejected { status: u16 },
}

/// Outbound half of the adapter
#[async_trait]
pub trait EventSender: Send + Sync {
    /// Deliver one event; `Ok` only when the sink acknowledged it
    async fn send(&self, event: &CanonicalEvent) -> Result<(), SendError>;
}

#[derive(Debug, Clone)]
pub struct HttpEventSender {
    http_client: Client,
    sink: Url,
}

impl HttpEventSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(sink: Url, timeout: Duration) -> Result<Self, SendError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client, sink })
    }
}

#[async_trait]
impl EventSender for HttpEventSender {
    async fn send(&self, event: &CanonicalEvent) -> Result<(), SendError> {
        let id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("adapter.send", event.id = %id, event_type = %event.event_type);
        async move {
            let response = self
                .http_client
                .post(self.sink.clone())
                .header("ce-specversion", "1.0")
                .header("ce-id", &id)
                .header("ce-type", &event.event_type)
                .header("ce-source", &event.source)
                .header("ce-time", Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
                .header(format!("ce-{EVENT_HEADER_EXTENSION}"), &event.event_header)
                .header("content-type", "application/json")
                .body(event.data.clone())
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(SendError::Rejected {
                    status: status.as_u16(),
                });
            }
            debug!(status = status.as_u16(), "Event acknowledged by sink");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
