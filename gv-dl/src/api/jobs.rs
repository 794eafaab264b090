//! Job status endpoint

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::JobSnapshot;
use crate::AppState;

/// GET /jobs/:job_id
///
/// Current state of a job accepted by this process. Jobs are kept in memory
/// only and do not survive a restart.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobSnapshot>> {
    state
        .coordinator
        .job(job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))
}

pub fn job_routes() -> Router<AppState> {
    Router::new().route("/jobs/:job_id", get(get_job))
}
