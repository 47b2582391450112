// DDS Ledger - Web Server

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dds_ledger::api::{router, AppState};
use dds_ledger::config::ServerConfig;
use dds_ledger::{count_entries, open_database};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter)
                .with_context(|| format!("invalid log filter {:?}", config.log_filter))?,
        )
        .init();

    info!(version = dds_ledger::VERSION, "starting DDS ledger server");

    // Open database (schema is created on first start)
    let conn = open_database(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.display()))?;
    let entries = count_entries(&conn)?;
    info!(path = %config.database.display(), entries, "database ready");

    let app = router(AppState::new(conn));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind))?;
    info!(addr = %config.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
