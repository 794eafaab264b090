//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Year stored when the downloader did not report one
pub const UNKNOWN_YEAR: &str = "Unknown Year";

/// Reconciliation status of a song record
///
/// `Linked` holds exactly when `filename` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Waiting for the located file
    Pending,
    /// Filename recorded
    Linked,
    /// Album directory missing, unreadable or without audio files
    LocateFailed,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Linked => "linked",
            LinkStatus::LocateFailed => "locate_failed",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LinkStatus::Pending),
            "linked" => Ok(LinkStatus::Linked),
            "locate_failed" => Ok(LinkStatus::LocateFailed),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown link status: {}",
                other
            ))),
        }
    }
}

/// Persisted song record (`songs` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: i64,
    /// Job that produced this record (absent for rows written by older versions)
    pub job_id: Option<Uuid>,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// NULL until reconciled; never cleared once set
    pub filename: Option<String>,
    pub year: Option<String>,
    pub link_status: LinkStatus,
    pub link_error: Option<String>,
    pub download_date: DateTime<Utc>,
}

/// Fields for a new song record; `filename` always starts unset
#[derive(Debug, Clone)]
pub struct NewSong {
    pub job_id: Uuid,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
}
