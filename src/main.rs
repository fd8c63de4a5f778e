//! # GitLab Source Controller
//!
//! Registers GitLab webhooks for GitLabSource resources and runs one receive
//! adapter per source.

use anyhow::Result;
use gitlab_source_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.sources,
        init.adapters,
        init.reconciler,
        init.server_state,
        init.config,
    )
    .await
}
