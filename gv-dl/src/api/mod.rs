//! HTTP API handlers for gv-dl

pub mod download;
pub mod health;
pub mod jobs;
pub mod songs;
pub mod sse;

pub use download::download_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use songs::song_routes;
pub use sse::job_event_stream;
