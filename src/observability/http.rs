//! HTTP handlers shared by the controller and the receive adapter.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use tracing::error;

/// Router exposing `/metrics` and `/healthz`
pub fn metrics_router<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
}

pub async fn metrics_handler() -> impl IntoResponse {
    match super::metrics::gather_text() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

pub async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}
