//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{knative_service_resource, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::GitLabSource;
use crate::observability;
use anyhow::{Context, Result};
use kube::api::{Api, DynamicObject, ListParams};
use kube::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Everything the watch loop needs, built once at startup
pub struct InitializationResult {
    pub client: Client,
    /// API for GitLabSource resources
    pub sources: Api<GitLabSource>,
    /// API for the Knative Services running receive adapters
    pub adapters: Api<DynamicObject>,
    pub reconciler: Arc<Reconciler>,
    /// Readiness flag shared with `/readyz`
    pub server_state: Arc<ServerState>,
    /// Controller configuration
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Bring up the process in dependency order
///
/// TLS provider, tracing and metrics come first so every later step can log
/// and be measured. The probe server is bound before the Kubernetes client is
/// created, so a slow API server never fails the liveness probe.
///
/// # Errors
/// Fails when tracing or metrics cannot be set up, the probe server does not
/// bind in time, or no Kubernetes client can be built.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        // Already installed by an earlier caller in this process
        warn!("rustls crypto provider was already installed");
    }

    let config = ControllerConfig::from_env();
    observability::logging::init_tracing(config.log_format)
        .context("Failed to initialize tracing")?;

    info!(
        build.datetime = env!("BUILD_DATETIME"),
        build.git_hash = env!("BUILD_GIT_HASH"),
        "Starting GitLab source controller"
    );
    info!(
        receive_adapter_image = %config.receive_adapter_image,
        watch_namespace = config.watch_namespace.as_deref().unwrap_or("*"),
        "Loaded controller configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let port = config.metrics_port;
    let server = tokio::spawn({
        let state = Arc::clone(&server_state);
        async move {
            if let Err(e) = start_server(port, state).await {
                error!(port, error = %e, "Probe server exited");
            }
        }
    });
    wait_for_server_ready(&server_state, &server, &config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let (sources, adapters): (Api<GitLabSource>, Api<DynamicObject>) =
        match config.watch_namespace.as_deref() {
            Some(namespace) => (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced_with(client.clone(), namespace, &knative_service_resource()),
            ),
            None => (
                Api::all(client.clone()),
                Api::all_with(client.clone(), &knative_service_resource()),
            ),
        };

    let reconciler = Arc::new(
        Reconciler::new(client.clone(), config.clone())
            .context("Failed to create reconciler")?,
    );

    check_crd_queryable(&sources).await;

    info!("Controller initialized");

    Ok(InitializationResult {
        client,
        sources,
        adapters,
        reconciler,
        server_state,
        config,
    })
}

/// Poll until `start_server` has bound its listener
async fn wait_for_server_ready(
    state: &ServerState,
    server: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(config.server_startup_timeout_secs);
    let poll = Duration::from_millis(config.server_poll_interval_ms);

    while !state.ready() {
        if server.is_finished() {
            anyhow::bail!("probe server stopped before it was ready");
        }
        if Instant::now() >= deadline {
            anyhow::bail!(
                "probe server not ready after {}s",
                config.server_startup_timeout_secs
            );
        }
        tokio::time::sleep(poll).await;
    }
    info!(port = config.metrics_port, "Probe server is listening");
    Ok(())
}

/// Log how many GitLabSources exist, or why they cannot be listed
///
/// A missing CRD is not fatal here: the watch loop keeps retrying.
async fn check_crd_queryable(sources: &Api<GitLabSource>) {
    match sources.list(&ListParams::default().limit(1)).await {
        Ok(page) => debug!(listed = page.items.len(), "GitLabSource CRD is installed"),
        Err(e) => warn!(
            error = %e,
            "GitLabSource CRD is not queryable yet; install it with `crdgen | kubectl apply -f -`"
        ),
    }
}
