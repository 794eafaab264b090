//! Downloader output metadata extraction
//!
//! The downloader prints human-readable progress. The lines this module
//! depends on look like:
//!
//! ```text
//! ➤ Title: Test Song
//! ➤ Artist: Test Artist
//! ➤ Album: Test Album
//! ➤ Year: 2019
//! Output directory: [/srv/media]
//! ```
//!
//! Markers may appear in any order; the first occurrence of each wins.
//! Title, artist, album and output directory are required. When one is
//! missing the complete output is written verbatim to the diagnostic log so
//! unrecognized formats can be inspected offline.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, warn};

use gv_common::db::UNKNOWN_YEAR;

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)➤ Title:[ \t]*(.+)$").expect("valid regex"));
static ARTIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)➤ Artist:[ \t]*(.+)$").expect("valid regex"));
static ALBUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)➤ Album:[ \t]*(.+)$").expect("valid regex"));
static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)➤ Year:[ \t]*(\d{4})").expect("valid regex"));
static OUTPUT_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)Output directory:[ \t]*\[(.+)\]").expect("valid regex"));

/// Labeled marker in downloader output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Title,
    Artist,
    Album,
    Year,
    OutputDirectory,
}

impl Marker {
    pub fn label(&self) -> &'static str {
        match self {
            Marker::Title => "title",
            Marker::Artist => "artist",
            Marker::Album => "album",
            Marker::Year => "year",
            Marker::OutputDirectory => "output directory",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Marker::Title => &*TITLE,
            Marker::Artist => &*ARTIST,
            Marker::Album => &*ALBUM,
            Marker::Year => &*YEAR,
            Marker::OutputDirectory => &*OUTPUT_DIR,
        }
    }

    /// Trimmed value following the marker; blank values count as absent
    fn find(&self, raw: &str) -> Option<String> {
        let value = self.pattern().captures(raw)?.get(1)?.as_str().trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn join_markers(markers: &[Marker]) -> String {
    markers
        .iter()
        .map(Marker::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Metadata extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// One or more required markers absent
    #[error(
        "Metadata extraction failed (missing {}). Check {}.",
        join_markers(.missing),
        .diagnostic_log.display()
    )]
    MissingMarkers {
        missing: Vec<Marker>,
        /// Where the raw output was written
        diagnostic_log: PathBuf,
    },
}

/// Structured metadata derived from downloader output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Four-digit year or [`UNKNOWN_YEAR`]
    pub year: String,
    /// Base of the downloader's `<artist>/<album>/<file>` layout
    pub output_dir: PathBuf,
}

/// Turns raw downloader output into an [`ExtractionResult`]
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, raw: &str) -> Result<ExtractionResult, ExtractionError>;
}

/// Line-marker parser for the downloader's console output
#[derive(Debug, Clone)]
pub struct MarkerExtractor {
    diagnostic_log: PathBuf,
}

impl MarkerExtractor {
    pub fn new(diagnostic_log: PathBuf) -> Self {
        Self { diagnostic_log }
    }

    pub fn diagnostic_log(&self) -> &PathBuf {
        &self.diagnostic_log
    }

    fn dump_raw_output(&self, raw: &str) {
        if let Some(parent) = self.diagnostic_log.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("Cannot create {}: {}", parent.display(), e);
            }
        }
        match std::fs::write(&self.diagnostic_log, raw) {
            Ok(()) => warn!(
                "Metadata extraction failed, raw output written to {}",
                self.diagnostic_log.display()
            ),
            Err(e) => error!(
                "Metadata extraction failed and {} could not be written: {}",
                self.diagnostic_log.display(),
                e
            ),
        }
    }
}

impl MetadataExtractor for MarkerExtractor {
    fn extract(&self, raw: &str) -> Result<ExtractionResult, ExtractionError> {
        let title = Marker::Title.find(raw);
        let artist = Marker::Artist.find(raw);
        let album = Marker::Album.find(raw);
        let output_dir = Marker::OutputDirectory.find(raw);

        match (title, artist, album, output_dir) {
            (Some(title), Some(artist), Some(album), Some(output_dir)) => Ok(ExtractionResult {
                title,
                artist,
                album,
                year: Marker::Year
                    .find(raw)
                    .unwrap_or_else(|| UNKNOWN_YEAR.to_string()),
                output_dir: PathBuf::from(output_dir),
            }),
            (title, artist, album, output_dir) => {
                let missing = [
                    (Marker::Title, title.is_none()),
                    (Marker::Artist, artist.is_none()),
                    (Marker::Album, album.is_none()),
                    (Marker::OutputDirectory, output_dir.is_none()),
                ]
                .into_iter()
                .filter_map(|(marker, absent)| absent.then_some(marker))
                .collect();

                self.dump_raw_output(raw);
                Err(ExtractionError::MissingMarkers {
                    missing,
                    diagnostic_log: self.diagnostic_log.clone(),
                })
            }
        }
    }
}
