//! Downloaded file locator
//!
//! Looks for the audio file the downloader wrote under
//! `<output_dir>/<artist>/<album>/`. Only direct children of the album
//! directory are considered. When several audio files are present the
//! lexicographically smallest file name is chosen.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions recognized as downloaded audio (compared case-insensitively)
pub const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "flac"];

/// File locate errors
#[derive(Debug, Error)]
pub enum LocateError {
    /// Album directory missing, not a directory, or not readable
    #[error("Cannot read {}: {reason}", .path.display())]
    DirectoryUnreadable { path: PathBuf, reason: String },

    /// Directory readable but holds no recognized audio file
    #[error("No audio file found in {}", .path.display())]
    NoAudioFiles { path: PathBuf },

    /// Blocking directory scan did not complete
    #[error("Directory scan aborted: {0}")]
    ScanAborted(String),
}

/// Audio file selected for a song record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFile {
    pub path: PathBuf,
    /// File name only, as stored on the record
    pub filename: String,
}

/// Expected album directory for a download
///
/// Only plain name components of artist and album are kept. Roots, prefixes,
/// `.` and `..` are dropped, so the result always stays under `output_dir`.
pub fn album_dir(output_dir: &Path, artist: &str, album: &str) -> PathBuf {
    let mut dir = output_dir.to_path_buf();
    for part in [artist, album] {
        dir.extend(Path::new(part).components().filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        }));
    }
    dir
}

/// Check if a path has a recognized audio extension
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Locates downloaded audio files
#[derive(Debug, Clone, Default)]
pub struct FileLocator;

impl FileLocator {
    pub fn new() -> Self {
        Self
    }

    /// Scan the album directory and pick one audio file
    pub fn locate(
        &self,
        output_dir: &Path,
        artist: &str,
        album: &str,
    ) -> Result<LocatedFile, LocateError> {
        let dir = album_dir(output_dir, artist, album);

        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(LocateError::DirectoryUnreadable {
                    path: dir,
                    reason: "not a directory".to_string(),
                })
            }
            Err(e) => {
                return Err(LocateError::DirectoryUnreadable {
                    path: dir,
                    reason: e.to_string(),
                })
            }
        }

        // Sorted walk: the first audio entry is the lexicographically smallest
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(LocateError::DirectoryUnreadable {
                        path: dir,
                        reason: e.to_string(),
                    })
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() && is_audio_file(entry.path()) {
                return Ok(LocatedFile {
                    filename: entry.file_name().to_string_lossy().into_owned(),
                    path: entry.into_path(),
                });
            }
        }

        Err(LocateError::NoAudioFiles { path: dir })
    }

    /// [`FileLocator::locate`] on the blocking thread pool
    pub async fn locate_blocking(
        &self,
        output_dir: PathBuf,
        artist: String,
        album: String,
    ) -> Result<LocatedFile, LocateError> {
        let locator = self.clone();
        tokio::task::spawn_blocking(move || locator.locate(&output_dir, &artist, &album))
            .await
            .map_err(|e| LocateError::ScanAborted(e.to_string()))?
    }
}
