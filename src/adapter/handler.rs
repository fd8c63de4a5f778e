//! # Webhook Handler
//!
//! `POST /` receives deliveries; `/healthz` and `/metrics` serve the probes.

use super::{EventSender, Translator};
use crate::observability::{http::metrics_router, metrics};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// GitLab caps webhook payloads at 25 MiB
const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AdapterState {
    pub translator: Arc<Translator>,
    pub sender: Arc<dyn EventSender>,
}

impl std::fmt::Debug for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterState")
            .field("translator", &self.translator)
            .finish_non_exhaustive()
    }
}

pub fn router(state: AdapterState) -> Router {
    Router::new()
        .route("/", post(receive))
        .merge(metrics_router())
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn receive(State(state): State<AdapterState>, headers: HeaderMap, body: Bytes) -> Response {
    let event = match state.translator.translate(&headers, &body) {
        Ok(event) => event,
        Err(e) => {
            warn!(reason = e.reason(), "Rejected webhook delivery: {}", e);
            metrics::increment_requests_rejected(e.reason());
            return (
                StatusCode::BAD_REQUEST,
                format!("could not parse the webhook event: {e}"),
            )
                .into_response();
        }
    };

    if let Err(e) = state.sender.send(&event).await {
        warn!(event_type = %event.event_type, "Failed to deliver event: {}", e);
        metrics::increment_send_failures();
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("error handling the event: {e}"),
        )
            .into_response();
    }

    info!(event_type = %event.event_type, "Forwarded webhook delivery");
    metrics::increment_events_received(&event.event_type);
    StatusCode::ACCEPTED.into_response()
}
