//! Song record reconciliation
//!
//! Writes a located filename back onto the song record the job created.
//! The pipeline addresses records by id. Addressing by (title, artist,
//! album) is kept for callers that only know the metadata; it updates the
//! most recent record with that metadata which has no filename yet.

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db::songs;
use crate::services::file_locator::LocateError;

/// How to find the record to update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    Id(i64),
    Metadata {
        title: String,
        artist: String,
        album: String,
    },
}

/// Result of a link attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Filename written
    Linked,
    /// No unlinked record matched the key; nothing changed
    NoMatchingRecord,
}

/// Updates song records with located filenames
#[derive(Clone)]
pub struct Reconciler {
    db: SqlitePool,
}

impl Reconciler {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record `filename` on the record identified by `key`
    ///
    /// A record that already has a filename is never modified.
    pub async fn link(&self, key: &RecordKey, filename: &str) -> gv_common::Result<LinkOutcome> {
        let updated = match key {
            RecordKey::Id(id) => songs::update_filename_by_id(&self.db, *id, filename).await?,
            RecordKey::Metadata {
                title,
                artist,
                album,
            } => songs::update_filename(&self.db, title, artist, album, filename).await?,
        };

        if updated == 0 {
            warn!(?key, filename, "No unlinked song record matched");
            return Ok(LinkOutcome::NoMatchingRecord);
        }

        debug!(?key, filename, "Song record linked");
        Ok(LinkOutcome::Linked)
    }

    /// Mark the record as unlinkable, leaving `filename` unset
    pub async fn record_locate_failure(
        &self,
        id: i64,
        error: &LocateError,
    ) -> gv_common::Result<()> {
        let updated = songs::mark_locate_failed(&self.db, id, &error.to_string()).await?;
        if updated == 0 {
            debug!(song_id = id, "Locate failure not recorded; record already linked or gone");
        }
        Ok(())
    }
}
