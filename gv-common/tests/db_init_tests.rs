//! Tests for database initialization
//!
//! - Database file created automatically on first run
//! - Existing database reopened without error
//! - `songs` schema matches the persisted record layout

use gv_common::db::init::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("nested").join("gv.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("gv.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO songs (title, artist, album) VALUES ('t', 'a', 'b')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing rows must survive re-initialization");
}

#[tokio::test]
async fn test_songs_table_columns() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("gv.db")).await.unwrap();

    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('songs')")
        .fetch_all(&pool)
        .await
        .unwrap();

    for expected in [
        "id",
        "job_id",
        "title",
        "artist",
        "album",
        "filename",
        "year",
        "link_status",
        "link_error",
        "download_date",
    ] {
        assert!(
            columns.iter().any(|c| c == expected),
            "songs table missing column '{}'",
            expected
        );
    }
}

#[tokio::test]
async fn test_new_row_defaults_to_pending_without_filename() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("gv.db")).await.unwrap();

    sqlx::query("INSERT INTO songs (title, artist, album) VALUES ('t', 'a', 'b')")
        .execute(&pool)
        .await
        .unwrap();

    let (status, filename): (String, Option<String>) =
        sqlx::query_as("SELECT link_status, filename FROM songs")
            .fetch_one(&pool)
            .await
            .unwrap();

    assert_eq!(status, "pending");
    assert_eq!(filename, None);
}

#[tokio::test]
async fn test_link_status_constraint_rejects_unknown_values() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("gv.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO songs (title, artist, album, link_status) VALUES ('t', 'a', 'b', 'done')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}
