//! Song record listing

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use gv_common::db::SongRecord;

use crate::db::songs;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /songs - all records, newest download first
pub async fn list_songs(State(state): State<AppState>) -> ApiResult<Json<Vec<SongRecord>>> {
    Ok(Json(songs::list_songs(&state.db).await?))
}

/// GET /songs/:id
pub async fn get_song(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SongRecord>> {
    songs::get_song(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Song not found: {}", id)))
}

pub fn song_routes() -> Router<AppState> {
    Router::new()
        .route("/songs", get(list_songs))
        .route("/songs/:id", get(get_song))
}
