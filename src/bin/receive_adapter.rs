//! # GitLab Receive Adapter
//!
//! Receives GitLab webhook deliveries and forwards them to `K_SINK` as
//! CloudEvents. Configured from the environment the controller sets on the
//! receiver service; a missing or invalid value ends the process before it
//! binds.

use anyhow::{Context, Result};
use clap::Parser;
use gitlab_source_controller::adapter::{
    router, serve, shutdown_signal, AdapterState, HttpEventSender, Translator,
};
use gitlab_source_controller::config::{AdapterConfig, LogFormat};
use gitlab_source_controller::observability::{http::metrics_router, logging, metrics};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AdapterConfig::parse();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }
    logging::init_tracing(LogFormat::Json).context("Failed to initialize tracing")?;
    metrics::register_adapter_metrics()?;

    info!(
        event_source = %config.event_source,
        sink = %config.sink,
        namespace = %config.namespace,
        secret_token_configured = !config.secret_token.is_empty(),
        "Starting GitLab receive adapter"
    );

    let sender = HttpEventSender::new(config.sink.clone(), config.sink_timeout())
        .context("Failed to build the sink client")?;
    let state = AdapterState {
        translator: Arc::new(Translator::new(
            config.secret_token.clone(),
            config.event_source.clone(),
        )),
        sender: Arc::new(sender),
    };

    if config.metrics_port != config.port {
        let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
        let metrics_listener = TcpListener::bind(&metrics_addr)
            .await
            .with_context(|| format!("Failed to bind metrics port {metrics_addr}"))?;
        info!("Metrics server listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, metrics_router::<()>()).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Receive adapter listening on {}", addr);

    serve(listener, router(state), shutdown_signal(), config.shutdown_grace()).await?;
    info!("Receive adapter stopped");
    Ok(())
}
