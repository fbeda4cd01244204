//! Tabula Server - Main entry point

use anyhow::Result;
use std::{net::SocketAddr, time::Duration};
use tabula_common::logging::{init_logging, LogConfig};
use tokio::signal;
use tracing::info;

use tabula_server::{
    api::{self, AppState},
    config::Config,
    ingest::{find_orphan_tables, upload::ensure_upload_dir},
    stores::Stores,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("tabula-server")
        .filter_directives("tabula_server=debug,tower_http=debug,sqlx=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting Tabula Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    ensure_upload_dir(&config.upload.dir).await?;

    let stores = Stores::connect(&config).await?;
    info!("Store connections established");

    // Failed uploads leave tables behind; report them, never drop them
    match find_orphan_tables(&stores).await {
        Ok(report) if report.is_clean() => info!("No orphaned backing tables"),
        Ok(report) => tracing::warn!(
            orphan_tables = report.orphan_tables.len(),
            dangling_records = report.dangling_records.len(),
            tables = ?report.orphan_tables,
            "Stores are inconsistent; reconciliation is manual"
        ),
        Err(e) => tracing::warn!(error = %e, "Orphan scan failed"),
    }

    let app = api::create_router(AppState::new(stores.clone()), &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    stores.close().await;
    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give in-flight uploads a moment to finish
    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
