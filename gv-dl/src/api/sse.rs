//! Server-Sent Events for download job progress

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::AppState;

/// GET /events query
#[derive(Debug, Default, Deserialize)]
pub struct EventStreamQuery {
    /// Only stream this job's events
    pub job_id: Option<Uuid>,
}

/// GET /events - SSE stream of job events
///
/// Streams `JobStateChanged` and `SongLinked` events, preceded by a
/// `ConnectionStatus` event, with a heartbeat every 15 seconds. The stream
/// ends when the service begins shutting down.
pub async fn job_event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventStreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    gv_common::sse::job_event_sse_stream(
        crate::MODULE_NAME,
        state.event_bus.subscribe(),
        query.job_id,
        state.shutdown_signal(),
    )
}
