//! # Watch Loop
//!
//! Controller watch loop that monitors GitLabSource resources and their
//! receive adapters and triggers reconciliation when changes are detected.

use crate::adapter::shutdown_signal;
use crate::config::ControllerConfig;
use crate::constants::{RECEIVE_ADAPTER_LABEL_KEY, RECEIVE_ADAPTER_LABEL_VALUE};
use crate::controller::reconciler::{knative_service_resource, reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::GitLabSource;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::{Api, DynamicObject};
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop
///
/// Watches GitLabSources for all semantic changes and the Knative Services
/// they own, so a receive adapter becoming ready triggers a pass. The loop
/// restarts the controller when its stream ends and returns once a shutdown
/// signal was received.
pub async fn run_watch_loop(
    sources: Api<GitLabSource>,
    adapters: Api<DynamicObject>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    let backoff_duration_ms = Arc::new(AtomicU64::new(config.backoff_start_ms));

    // Mark the server not ready on SIGINT/SIGTERM; the controller stops via shutdown_on_signal
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    let adapter_selector = format!("{RECEIVE_ADAPTER_LABEL_KEY}={RECEIVE_ADAPTER_LABEL_VALUE}");

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let backoff = Arc::clone(&backoff_duration_ms);
        let backoff_start_ms = config.backoff_start_ms;
        let max_backoff_ms = config.backoff_max_ms;
        let watch_restart_delay_secs = config.watch_restart_delay_secs;
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        info!("Starting controller watch loop...");
        let controller_future = Controller::new(sources.clone(), watcher::Config::default().any_semantic())
            .owns_with(
                adapters.clone(),
                knative_service_resource(),
                watcher::Config::default().labels(&adapter_selector),
            )
            .with_config(
                controller::Config::default().concurrency(config.max_concurrent_reconciliations),
            )
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(move |x| {
                let backoff = Arc::clone(&backoff);
                async move {
                    match &x {
                        Ok((object, _action)) => {
                            backoff.store(backoff_start_ms, Ordering::Relaxed);
                            debug!(resource.name = %object.name, "watch.event.reconciled");
                            Some(x)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                max_backoff_ms,
                                watch_restart_delay_secs,
                            )
                            .await
                            .map(|()| x)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()));

        controller_future.instrument(watch_span).await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            config.watch_restart_delay_after_end_secs
        );
        tokio::time::sleep(Duration::from_secs(config.watch_restart_delay_after_end_secs)).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
