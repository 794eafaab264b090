//! gv-dl library interface
//!
//! Download service: runs an external downloader per URL, records what it
//! fetched and links the record to the file once it shows up on disk.
//! Exposed as a library so integration tests can build the router directly.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, PipelineError};

use axum::Router;
use chrono::{DateTime, Utc};
use gv_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::services::JobCoordinator;

/// Module name reported by health checks and logs
pub const MODULE_NAME: &str = "gv-dl";

/// Events buffered per SSE subscriber
pub const EVENT_BUS_CAPACITY: usize = 100;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Song record store
    pub db: SqlitePool,
    /// Download pipeline
    pub coordinator: JobCoordinator,
    /// Job event broadcast for SSE
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Flips to true once shutdown begins
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(db: SqlitePool, coordinator: JobCoordinator) -> Self {
        Self {
            event_bus: coordinator.event_bus().clone(),
            db,
            coordinator,
            startup_time: Utc::now(),
            shutdown: Arc::new(watch::channel(false).0),
        }
    }

    /// Stop admitting downloads and end open event streams
    ///
    /// Jobs waiting for a downloader slot fail with a closed pool. Jobs
    /// already running finish normally.
    pub fn begin_shutdown(&self) {
        self.coordinator.close();
        self.shutdown.send_replace(true);
    }

    /// Receiver that turns true once shutdown begins
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::download_routes())
        .merge(api::song_routes())
        .merge(api::job_routes())
        .route("/events", get(api::job_event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
