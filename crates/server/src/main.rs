mod bootstrap;
mod health;
mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use leadflow_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;

fn init_logging(config: &AppConfig) {
    use leadflow_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    match app.orchestrator.resync_pending().await {
        Ok(recovered) => tracing::info!(
            event_name = "system.calendar.resync",
            correlation_id = "bootstrap",
            lead_id = "unknown",
            recovered,
            "pending calendar events resynchronized"
        ),
        Err(error) => tracing::warn!(
            event_name = "system.calendar.resync_failed",
            correlation_id = "bootstrap",
            lead_id = "unknown",
            error = %error,
            "pending calendar events left for the next start"
        ),
    }

    let address: SocketAddr = format!("{}:{}", app.config.server.bind_address, app.config.server.port)
        .parse()
        .context("invalid server bind address")?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    let router = health::router(app.db_pool.clone())
        .merge(webhook::router(app.orchestrator.clone()))
        .layer(TraceLayer::new_for_http());

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.notified().await })
            .await
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        lead_id = "unknown",
        %address,
        "leadflow-server listening"
    );

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        lead_id = "unknown",
        "leadflow-server stopping"
    );
    shutdown.notify_one();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(Ok(result)) => result.context("server error")?,
        Ok(Err(join)) => return Err(join).context("server task panicked"),
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            lead_id = "unknown",
            grace_secs = app.config.server.graceful_shutdown_secs,
            "in-flight requests did not finish before the grace period"
        ),
    }

    app.db_pool.close().await;
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
