//! # Event Translator
//!
//! Turns a webhook delivery into a [`CanonicalEvent`].
//!
//! Checks run in a fixed order and stop at the first failure: token, event
//! header, body. Nothing is parsed before the caller is authenticated.

use crate::constants::{GITLAB_EVENT_HEADER, GITLAB_TOKEN_HEADER};
use crate::crd::{category_from_header, event_type, is_known_event_type};
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

/// A delivery ready to be sent as a CloudEvent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    /// `dev.knative.sources.gitlab.<token>`
    pub event_type: String,
    /// Configured project or group URL
    pub source: String,
    /// `X-Gitlab-Event` exactly as received
    pub event_header: String,
    /// Payload bytes exactly as received
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid or missing X-Gitlab-Token header")]
    Unauthorized,
    #[error("missing X-Gitlab-Event header")]
    MissingEventHeader,
    #[error("invalid X-Gitlab-Event header {0:?}")]
    InvalidEventHeader(String),
    #[error("event type {0:?} not defined to be parsed")]
    UnknownEventType(String),
    #[error("empty request body")]
    EmptyBody,
    #[error("invalid JSON payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

impl TranslateError {
    /// Metric label
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::MissingEventHeader | Self::InvalidEventHeader(_) => "invalid_header",
            Self::UnknownEventType(_) => "unknown_event_type",
            Self::EmptyBody => "empty_body",
            Self::InvalidPayload(_) | Self::NotAnObject => "invalid_payload",
        }
    }
}

/// Translation settings fixed for the lifetime of one adapter
pub struct Translator {
    secret_token: Zeroizing<String>,
    event_source: String,
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("event_source", &self.event_source)
            .field("authenticated", &!self.secret_token.is_empty())
            .finish()
    }
}

impl Translator {
    /// An empty `secret_token` accepts every delivery
    pub fn new(secret_token: impl Into<String>, event_source: impl Into<String>) -> Self {
        Self {
            secret_token: Zeroizing::new(secret_token.into()),
            event_source: event_source.into(),
        }
    }

    /// Validate a delivery and derive its canonical event
    ///
    /// # Errors
    /// Returns the first check the delivery fails.
    pub fn translate(&self, headers: &HeaderMap, body: &[u8]) -> Result<CanonicalEvent, TranslateError> {
        self.authenticate(headers)?;

        let event_header = headers
            .get(GITLAB_EVENT_HEADER)
            .ok_or(TranslateError::MissingEventHeader)?
            .to_str()
            .map_err(|_| TranslateError::InvalidEventHeader("<non-ascii>".to_string()))?;
        if event_header.trim().is_empty() {
            return Err(TranslateError::MissingEventHeader);
        }
        let token = category_from_header(event_header)
            .ok_or_else(|| TranslateError::InvalidEventHeader(event_header.to_string()))?;
        if !is_known_event_type(&token) {
            return Err(TranslateError::UnknownEventType(event_header.to_string()));
        }

        if body.is_empty() {
            return Err(TranslateError::EmptyBody);
        }
        let payload: serde_json::Value = serde_json::from_slice(body)?;
        if !payload.is_object() {
            return Err(TranslateError::NotAnObject);
        }

        Ok(CanonicalEvent {
            event_type: event_type(&token),
            source: self.event_source.clone(),
            event_header: event_header.to_string(),
            data: body.to_vec(),
        })
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<(), TranslateError> {
        if self.secret_token.is_empty() {
            return Ok(());
        }
        let presented = headers
            .get(GITLAB_TOKEN_HEADER)
            .map(axum::http::HeaderValue::as_bytes)
            .unwrap_or_default();
        if bool::from(presented.ct_eq(self.secret_token.as_bytes())) {
            Ok(())
        } else {
            Err(TranslateError::Unauthorized)
        }
    }
}
