//! Auto-organize service entry point
//!
//! Runs the scheduled watch-folder scan and serves the organize API.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autoorganize::app::{AppState, build_app};
use autoorganize::config::Config;
use autoorganize::db::Database;
use autoorganize::jobs;
use autoorganize::services::{FileChangeSuppressor, FolderScanner, OrganizerDeps, OrganizerService, TvMazeClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoorganize=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Arc::new(Config::from_env()?);
    tracing::info!("Starting auto-organize service");

    let database_file = config.database_file();
    if let Some(parent) = database_file.as_deref().and_then(std::path::Path::parent)
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db = Database::connect(&config.sqlite_url()).await?;
    tracing::info!("Database connected");

    let monitor = Arc::new(FileChangeSuppressor::new());
    let metadata = Arc::new(TvMazeClient::with_base_url(
        &config.tvmaze_base_url,
        config.provider_timeout,
    ));

    let organizer = Arc::new(OrganizerService::new(OrganizerDeps {
        db: db.clone(),
        config: Arc::new(db.settings()),
        metadata,
        library: Arc::new(db.library()),
        monitor: monitor.clone(),
    }));
    let scanner = FolderScanner::new(organizer.clone(), config.scan_concurrency);
    tracing::info!("Organizer service initialized");

    let shutdown = CancellationToken::new();
    let mut scheduler = jobs::start_scheduler(scanner.clone(), &config.organize_schedule, shutdown.clone()).await?;

    let state = AppState {
        config: config.clone(),
        db,
        organizer,
        scanner,
        monitor,
        shutdown: shutdown.clone(),
    };
    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Failed to stop job scheduler");
    }
    tracing::info!("Shut down");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
