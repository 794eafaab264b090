//! Song record persistence
//!
//! Records are appended with no filename and updated once reconciliation
//! finds the downloaded file. A filename, once set, is never overwritten:
//! every update is guarded by `filename IS NULL`.

use chrono::{DateTime, Utc};
use gv_common::db::{LinkStatus, NewSong, SongRecord};
use gv_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const SELECT_COLUMNS: &str = r#"
    SELECT id, job_id, title, artist, album, filename, year,
           link_status, link_error, download_date
    FROM songs
"#;

/// Insert a new song record with filename unset; returns the assigned id
pub async fn insert_song(pool: &SqlitePool, song: &NewSong) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO songs (job_id, title, artist, album, filename, year, link_status, download_date)
        VALUES (?, ?, ?, ?, NULL, ?, 'pending', ?)
        "#,
    )
    .bind(song.job_id.to_string())
    .bind(&song.title)
    .bind(&song.artist)
    .bind(&song.album)
    .bind(&song.year)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Set the filename on the most recent unlinked record matching the metadata
///
/// Returns the number of rows updated. Zero means no unlinked record matched,
/// which callers treat as a non-fatal outcome.
pub async fn update_filename(
    pool: &SqlitePool,
    title: &str,
    artist: &str,
    album: &str,
    filename: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE songs
        SET filename = ?, link_status = 'linked', link_error = NULL
        WHERE id = (
            SELECT id FROM songs
            WHERE title = ? AND artist = ? AND album = ? AND filename IS NULL
            ORDER BY id DESC
            LIMIT 1
        )
        "#,
    )
    .bind(filename)
    .bind(title)
    .bind(artist)
    .bind(album)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Set the filename on a record addressed by id
pub async fn update_filename_by_id(pool: &SqlitePool, id: i64, filename: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE songs
        SET filename = ?, link_status = 'linked', link_error = NULL
        WHERE id = ? AND filename IS NULL
        "#,
    )
    .bind(filename)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Record that no file could be located for an unlinked record
pub async fn mark_locate_failed(pool: &SqlitePool, id: i64, reason: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE songs
        SET link_status = 'locate_failed', link_error = ?
        WHERE id = ? AND filename IS NULL
        "#,
    )
    .bind(reason)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Load one record
pub async fn get_song(pool: &SqlitePool, id: i64) -> Result<Option<SongRecord>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_song).transpose()
}

/// All records, newest download first
pub async fn list_songs(pool: &SqlitePool) -> Result<Vec<SongRecord>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY download_date DESC, id DESC",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_song).collect()
}

fn row_to_song(row: &SqliteRow) -> Result<SongRecord> {
    let job_id: Option<String> = row.try_get("job_id")?;
    let link_status: String = row.try_get("link_status")?;
    let download_date: DateTime<Utc> = row.try_get("download_date")?;

    Ok(SongRecord {
        id: row.try_get("id")?,
        job_id: job_id.and_then(|s| Uuid::parse_str(&s).ok()),
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        album: row.try_get("album")?,
        filename: row.try_get("filename")?,
        year: row.try_get("year")?,
        link_status: link_status.parse::<LinkStatus>()?,
        link_error: row.try_get("link_error")?,
        download_date,
    })
}
