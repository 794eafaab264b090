//! Download job events
//!
//! Job state definitions shared between the pipeline and its observers,
//! plus the broadcast EventBus used to fan events out to SSE clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Download job state
///
/// ```text
/// Pending → Running → { SpawnFailed | ExtractionFailed | Extracted }
/// Pending → SpawnFailed (no downloader slot could be granted)
/// Extracted → { PersistenceFailed | Persisted }
/// Persisted → { LocateFailed | Linked }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted, waiting for a downloader slot
    Pending,
    /// Downloader process running
    Running,
    /// Process could not start or exited non-zero
    SpawnFailed,
    /// Required marker missing from downloader output
    ExtractionFailed,
    /// Metadata extracted, not yet stored
    Extracted,
    /// Store write failed
    PersistenceFailed,
    /// Record stored; caller has been answered
    Persisted,
    /// No audio file found for the record
    LocateFailed,
    /// Filename recorded on the song record
    Linked,
}

impl JobState {
    /// No further transitions possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::SpawnFailed
                | JobState::ExtractionFailed
                | JobState::PersistenceFailed
                | JobState::LocateFailed
                | JobState::Linked
        )
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, SpawnFailed)
                | (Running, SpawnFailed)
                | (Running, ExtractionFailed)
                | (Running, Extracted)
                | (Extracted, PersistenceFailed)
                | (Extracted, Persisted)
                | (Persisted, LocateFailed)
                | (Persisted, Linked)
        )
    }
}

/// Job events broadcast on the EventBus and streamed over SSE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// Job moved to a new state
    JobStateChanged {
        job_id: Uuid,
        old_state: JobState,
        new_state: JobState,
        /// Failure message for failed states
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Located file recorded on its song record
    SongLinked {
        job_id: Uuid,
        song_id: i64,
        filename: String,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// SSE event name
    pub fn event_type(&self) -> &str {
        match self {
            JobEvent::JobStateChanged { .. } => "JobStateChanged",
            JobEvent::SongLinked { .. } => "SongLinked",
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::JobStateChanged { job_id, .. } | JobEvent::SongLinked { job_id, .. } => {
                *job_id
            }
        }
    }
}

/// Broadcast channel for job events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Creates a new EventBus; `capacity` events are buffered per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: JobEvent) -> Result<usize, broadcast::error::SendError<JobEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: JobEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("No subscribers for {}", e.0.event_type());
        }
    }
}
