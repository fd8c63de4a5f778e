//! # Response Types
//!
//! GitLab REST API v4 hook representation. Only the fields the controller
//! reads are deserialized.

use crate::provider::Hook;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HookResponse {
    pub id: i64,
    #[serde(default)]
    pub url: String,
}

impl From<HookResponse> for Hook {
    fn from(response: HookResponse) -> Self {
        Self {
            id: response.id,
            url: response.url,
        }
    }
}

/// Error body GitLab returns, either `{"message": ...}` or `{"error": ...}`
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    /// Best human-readable message from a raw error body
    pub fn message_from(body: &str) -> String {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse {
                message: Some(serde_json::Value::String(message)),
                ..
            }) => message,
            Ok(ErrorResponse {
                message: Some(other),
                ..
            }) => other.to_string(),
            Ok(ErrorResponse {
                error: Some(error), ..
            }) => error,
            _ => body.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            ErrorResponse::message_from(r#"{"message":"404 Not found"}"#),
            "404 Not found"
        );
        assert_eq!(
            ErrorResponse::message_from(r#"{"error":"invalid_token"}"#),
            "invalid_token"
        );
        assert_eq!(
            ErrorResponse::message_from(r#"{"message":{"url":["is blocked"]}}"#),
            r#"{"url":["is blocked"]}"#
        );
        assert_eq!(ErrorResponse::message_from("Bad Gateway\n"), "Bad Gateway");
    }
}
