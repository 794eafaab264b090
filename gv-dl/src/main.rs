//! gv-dl - GrabVault download service
//!
//! Accepts media URLs over HTTP, hands each one to the external downloader
//! and keeps a record of what was fetched and where the file landed.
//!
//! Default port: 5731

use std::fs::{File, OpenOptions};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gv_common::config::{load_toml_config_or_default, RootFolderInitializer, RootFolderResolver};
use gv_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gv_dl::config::ServiceConfig;
use gv_dl::services::{ExternalDownloader, JobCoordinator, MarkerExtractor};
use gv_dl::{build_router, AppState, EVENT_BUS_CAPACITY, MODULE_NAME};

/// Command-line arguments for gv-dl
#[derive(Parser, Debug)]
#[command(name = "gv-dl")]
#[command(about = "GrabVault download service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "GV_PORT")]
    port: Option<u16>,

    /// Address to bind (default 127.0.0.1)
    #[arg(short, long, env = "GV_BIND")]
    bind: Option<IpAddr>,

    /// Root folder holding the database, media and diagnostic log
    #[arg(short, long, env = "GV_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file (default: <config dir>/gv/config.toml)
    #[arg(short, long, env = "GV_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = load_toml_config_or_default(args.config.as_deref());

    let (log_file, log_file_error) = match toml_config.logging.file.as_deref() {
        Some(path) => match open_log_file(path) {
            Ok(file) => (Some(file), None),
            Err(e) => (None, Some(e)),
        },
        None => (None, None),
    };
    let to_console = log_file.is_none();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "gv_dl={level},gv_common={level},tower_http=info",
                    level = toml_config.logging.level
                )
                .into()
            }),
        )
        .with(log_file.map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file))
        }))
        .with(to_console.then(|| tracing_subscriber::fmt::layer()))
        .init();

    if let Some(e) = log_file_error {
        warn!("Logging to the console: {:#}", e);
    }

    info!(
        "Starting GrabVault download service ({}) v{} [{}] built {} ({})",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .with_toml_config(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let config = ServiceConfig::resolve(&initializer, &toml_config, args.port, args.bind);
    config
        .ensure_media_dir()
        .with_context(|| format!("Failed to create {}", config.media_dir.display()))?;

    info!("Root folder: {}", config.root_folder.display());
    info!("Database: {}", config.database_path.display());
    info!("Media directory: {}", config.media_dir.display());
    info!("Diagnostic log: {}", config.diagnostic_log.display());
    info!(
        program = %config.downloader.program,
        args = ?config.downloader.args,
        settle_delay_ms = config.downloader.settle_delay_ms,
        max_concurrent = config.downloader.max_concurrent_downloads,
        "Downloader configured"
    );

    let db = gv_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let coordinator = JobCoordinator::new(
        db.clone(),
        Arc::new(ExternalDownloader::from_config(&config.downloader)),
        Arc::new(MarkerExtractor::new(config.diagnostic_log.clone())),
        event_bus,
        config.coordinator_settings(),
    );

    let state = AppState::new(db, coordinator);
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Before the drain: no new downloader processes, SSE clients released
            state.begin_shutdown();
        })
        .await
        .context("Server error")?;

    // Pending reconciliation tasks are abandoned; their records stay unlinked
    info!("Server shutdown complete");
    Ok(())
}

/// Open the configured log file for appending
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
