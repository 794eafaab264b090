//! Download request endpoint
//!
//! POST /download answers once the song record is stored (or a step before
//! that fails). Both outcomes are HTTP 200; `success` tells them apart.
//! A body that is not a JSON object is treated as a request without a URL.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;

/// Error returned for a blank or missing URL
pub const NO_URL_MESSAGE: &str = "No URL provided";

/// POST /download request
#[derive(Debug, Default, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// POST /download response
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResponse {
    fn failure(job_id: Option<Uuid>, error: String) -> Self {
        Self {
            success: false,
            title: None,
            artist: None,
            album: None,
            job_id,
            song_id: None,
            error: Some(error),
        }
    }
}

/// POST /download
pub async fn start_download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Json<DownloadResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("Unreadable download request body: {}", rejection.body_text());
            DownloadRequest::default()
        }
    };

    let url = match request.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            tracing::debug!("Rejected download request without URL");
            return Json(DownloadResponse::failure(None, NO_URL_MESSAGE.to_string()));
        }
    };

    match state.coordinator.submit(url).await {
        Ok(accepted) => Json(DownloadResponse {
            success: true,
            title: Some(accepted.title),
            artist: Some(accepted.artist),
            album: Some(accepted.album),
            job_id: Some(accepted.job_id),
            song_id: Some(accepted.song_id),
            error: None,
        }),
        Err(failure) => Json(DownloadResponse::failure(
            Some(failure.job_id),
            failure.error.to_string(),
        )),
    }
}

pub fn download_routes() -> Router<AppState> {
    Router::new().route("/download", post(start_download))
}
