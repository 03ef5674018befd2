//! PomoSync - session sync and reminder delivery service
//!
//! Loads configuration, opens the database, runs the reminder scheduler
//! until Ctrl-C.

use anyhow::Context;
use pomosync_api::utils::logging::init_tracing;
use pomosync_api::AppContext;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the config loader reads POMOSYNC_* variables.
    let dotenv = dotenvy::dotenv();

    let config = pomosync_infra::config::load().context("failed to load configuration")?;
    init_tracing(&config.logging)?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "could not read .env"),
    }

    let ctx = AppContext::new(config).await.context("failed to initialise application")?;
    ctx.start_scheduler().await.context("failed to start reminder scheduler")?;
    info!("PomoSync running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    ctx.shutdown().await.context("shutdown failed")?;
    Ok(())
}
