//! Download job (in-memory state)
//!
//! One job per accepted URL. The job walks the pipeline states defined in
//! [`JobState`]; the coordinator owns it and publishes a [`JobSnapshot`]
//! after every transition.

use chrono::{DateTime, Utc};
use gv_common::events::JobState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::services::metadata_extractor::ExtractionResult;

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: JobState,
    pub new_state: JobState,
    pub transitioned_at: DateTime<Utc>,
}

/// One download request moving through the pipeline
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub job_id: Uuid,
    pub url: String,
    pub state: JobState,
    pub media_dir: PathBuf,
    /// Downloader stdout + stderr, kept when the job fails after the run
    pub raw_output: Option<String>,
    pub extraction: Option<ExtractionResult>,
    pub song_id: Option<i64>,
    pub filename: Option<String>,
    /// Failure message for failed states
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Serializable view of a job for the API and the job registry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub url: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub song_id: Option<i64>,
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Captured downloader output of a failed job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DownloadJob {
    pub fn new(url: String, media_dir: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            url,
            state: JobState::Pending,
            media_dir,
            raw_output: None,
            extraction: None,
            song_id: None,
            filename: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: JobState) -> StateTransition {
        debug_assert!(
            self.state.can_transition_to(new_state),
            "invalid job transition {:?} -> {:?}",
            self.state,
            new_state
        );

        let transition = StateTransition {
            job_id: self.job_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        self.updated_at = transition.transitioned_at;

        transition
    }

    /// Transition to a failed state, keeping the failure message
    pub fn fail(&mut self, new_state: JobState, message: impl Into<String>) -> StateTransition {
        self.error = Some(message.into());
        self.transition_to(new_state)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let extraction = self.extraction.as_ref();
        JobSnapshot {
            job_id: self.job_id,
            url: self.url.clone(),
            state: self.state,
            title: extraction.map(|e| e.title.clone()),
            artist: extraction.map(|e| e.artist.clone()),
            album: extraction.map(|e| e.album.clone()),
            year: extraction.map(|e| e.year.clone()),
            song_id: self.song_id,
            filename: self.filename.clone(),
            error: self.error.clone(),
            raw_output: self.raw_output.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = DownloadJob::new("https://x.test/1".to_string(), PathBuf::from("/m"));
        assert_eq!(job.state, JobState::Pending);
        assert!(!job.is_terminal());
        assert!(job.song_id.is_none());
    }

    #[test]
    fn test_transition_records_old_and_new_state() {
        let mut job = DownloadJob::new("u".to_string(), PathBuf::from("/m"));

        let t = job.transition_to(JobState::Running);

        assert_eq!(t.job_id, job.job_id);
        assert_eq!(t.old_state, JobState::Pending);
        assert_eq!(t.new_state, JobState::Running);
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.updated_at, t.transitioned_at);
    }

    #[test]
    fn test_fail_keeps_message() {
        let mut job = DownloadJob::new("u".to_string(), PathBuf::from("/m"));
        job.transition_to(JobState::Running);

        job.fail(JobState::SpawnFailed, "freyr exited with status 1");

        assert!(job.is_terminal());
        assert_eq!(job.snapshot().error.as_deref(), Some("freyr exited with status 1"));
    }

    #[test]
    fn test_snapshot_carries_extracted_metadata() {
        let mut job = DownloadJob::new("u".to_string(), PathBuf::from("/m"));
        job.extraction = Some(ExtractionResult {
            title: "T".to_string(),
            artist: "A".to_string(),
            album: "B".to_string(),
            year: "2019".to_string(),
            output_dir: PathBuf::from("/m"),
        });
        job.song_id = Some(7);

        let snapshot = job.snapshot();
        assert_eq!(snapshot.title.as_deref(), Some("T"));
        assert_eq!(snapshot.song_id, Some(7));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "PENDING");
        assert!(json["filename"].is_null());
        assert!(json.get("error").is_none());
        assert!(json.get("raw_output").is_none());
    }

    #[test]
    fn test_snapshot_keeps_output_of_failed_run() {
        let mut job = DownloadJob::new("u".to_string(), PathBuf::from("/m"));
        job.transition_to(JobState::Running);
        job.raw_output = Some("rate limited\n".to_string());
        job.fail(JobState::SpawnFailed, "freyr exited with status 2");

        let json = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(json["state"], "SPAWN_FAILED");
        assert_eq!(json["raw_output"], "rate limited\n");
    }
}
