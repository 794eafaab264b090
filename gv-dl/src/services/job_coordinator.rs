//! Download job coordinator
//!
//! Runs one URL through the pipeline:
//!
//! ```text
//! spawn downloader → extract metadata → insert record   (caller waits)
//!        └─ process exit ─ settle delay → locate file → link record   (after the answer)
//! ```
//!
//! Each job runs on its own task. The caller is answered as soon as the
//! record is stored or an earlier step fails. Locating and linking the file
//! happens afterwards on the same task and never changes that answer; its outcome is visible through the job
//! registry, the event bus and the record's `link_status`.

use chrono::Utc;
use gv_common::db::NewSong;
use gv_common::events::{EventBus, JobEvent, JobState};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::songs;
use crate::error::PipelineError;
use crate::models::{DownloadJob, JobSnapshot, StateTransition};
use crate::services::file_locator::FileLocator;
use crate::services::job_registry::JobRegistry;
use crate::services::metadata_extractor::MetadataExtractor;
use crate::services::process_runner::{ProcessRunner, SpawnError};
use crate::services::reconciler::{LinkOutcome, Reconciler, RecordKey};

/// Coordinator tuning
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Directory handed to the downloader
    pub media_dir: PathBuf,
    /// Wait between process exit and the locate attempt
    pub settle_delay: Duration,
    /// Downloader processes allowed to run at once
    pub max_concurrent_downloads: usize,
}

/// Successful answer for a download request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedJob {
    pub job_id: Uuid,
    pub song_id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
}

/// Failed answer for a download request
#[derive(Debug, Error)]
#[error("{error}")]
pub struct JobFailure {
    pub job_id: Uuid,
    /// State the job stopped in
    pub state: JobState,
    pub error: PipelineError,
}

struct Inner {
    db: SqlitePool,
    runner: Arc<dyn ProcessRunner>,
    extractor: Arc<dyn MetadataExtractor>,
    locator: FileLocator,
    reconciler: Reconciler,
    registry: JobRegistry,
    event_bus: EventBus,
    downloads: Arc<Semaphore>,
    settings: CoordinatorSettings,
}

/// Drives download jobs through the pipeline
#[derive(Clone)]
pub struct JobCoordinator {
    inner: Arc<Inner>,
}

impl JobCoordinator {
    pub fn new(
        db: SqlitePool,
        runner: Arc<dyn ProcessRunner>,
        extractor: Arc<dyn MetadataExtractor>,
        event_bus: EventBus,
        settings: CoordinatorSettings,
    ) -> Self {
        let permits = settings.max_concurrent_downloads.max(1);
        Self {
            inner: Arc::new(Inner {
                reconciler: Reconciler::new(db.clone()),
                db,
                runner,
                extractor,
                locator: FileLocator::new(),
                registry: JobRegistry::new(),
                event_bus,
                downloads: Arc::new(Semaphore::new(permits)),
                settings,
            }),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Latest snapshot of a job
    pub async fn job(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.inner.registry.get(job_id).await
    }

    /// Watch a job's state changes
    pub async fn subscribe(&self, job_id: Uuid) -> Option<watch::Receiver<JobSnapshot>> {
        self.inner.registry.subscribe(job_id).await
    }

    /// Stop granting downloader slots; queued and future jobs fail to spawn
    pub fn close(&self) {
        self.inner.downloads.close();
    }

    /// Run a URL through the pipeline up to the stored record
    ///
    /// Returns once the record is stored or an earlier step fails. The job
    /// runs on its own task: dropping the returned future does not stop the
    /// downloader, the record insert or the file reconciliation that follows.
    pub async fn submit(&self, url: String) -> Result<AcceptedJob, JobFailure> {
        let job = DownloadJob::new(url, self.inner.settings.media_dir.clone());
        let job_id = job.job_id;
        self.inner.registry.register(job.snapshot()).await;
        info!(job_id = %job_id, url = %job.url, "Download job accepted");

        let (answer_tx, answer_rx) = oneshot::channel();
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.run_job(job, answer_tx).await });

        match answer_rx.await {
            Ok(answer) => answer,
            Err(_) => {
                error!(job_id = %job_id, "Download job ended without an answer");
                let state = match self.job(job_id).await {
                    Some(snapshot) => snapshot.state,
                    None => JobState::Pending,
                };
                Err(JobFailure {
                    job_id,
                    state,
                    error: PipelineError::Interrupted("job task stopped".to_string()),
                })
            }
        }
    }

    async fn run_job(
        self,
        mut job: DownloadJob,
        answer: oneshot::Sender<Result<AcceptedJob, JobFailure>>,
    ) {
        match self.store_download(&mut job).await {
            Ok((accepted, exited_at)) => {
                if answer.send(Ok(accepted)).is_err() {
                    debug!(job_id = %job.job_id, "Caller left before the record was stored");
                }
                tokio::time::sleep_until(exited_at + self.inner.settings.settle_delay).await;
                self.reconcile(&mut job).await;
            }
            Err(failure) => {
                if answer.send(Err(failure)).is_err() {
                    debug!(job_id = %job.job_id, "Caller left before the job failed");
                }
            }
        }
    }

    /// Spawn, extract and insert; yields the answer and the process exit time
    async fn store_download(
        &self,
        job: &mut DownloadJob,
    ) -> Result<(AcceptedJob, Instant), JobFailure> {
        let permit = match self.inner.downloads.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return Err(self
                    .fail(job, JobState::SpawnFailed, SpawnError::PoolClosed.into())
                    .await)
            }
        };

        self.transition(job, JobState::Running).await;
        let result = self.inner.runner.run(&job.url, &job.media_dir).await;
        let exited_at = Instant::now();
        drop(permit);

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                if let Some(captured) = e.captured_output() {
                    warn!(job_id = %job.job_id, output = %captured, "Downloader output");
                    job.raw_output = Some(captured.to_string());
                }
                return Err(self.fail(job, JobState::SpawnFailed, e.into()).await);
            }
        };
        debug!(
            job_id = %job.job_id,
            exit_code = ?output.exit_code,
            bytes = output.text.len(),
            "Downloader exited"
        );

        // A failed extraction writes the diagnostic log, so keep it off the runtime
        let extractor = Arc::clone(&self.inner.extractor);
        let text = output.text;
        let extracted = tokio::task::spawn_blocking(move || {
            let result = extractor.extract(&text);
            (result, text)
        })
        .await;

        let extraction = match extracted {
            Ok((Ok(extraction), _)) => extraction,
            Ok((Err(e), text)) => {
                job.raw_output = Some(text);
                return Err(self.fail(job, JobState::ExtractionFailed, e.into()).await);
            }
            Err(e) => {
                let error = PipelineError::Interrupted(format!("metadata extraction: {}", e));
                return Err(self.fail(job, JobState::ExtractionFailed, error).await);
            }
        };
        job.extraction = Some(extraction.clone());
        self.transition(job, JobState::Extracted).await;

        let new_song = NewSong {
            job_id: job.job_id,
            title: extraction.title.clone(),
            artist: extraction.artist.clone(),
            album: extraction.album.clone(),
            year: extraction.year.clone(),
        };
        let song_id = match songs::insert_song(&self.inner.db, &new_song).await {
            Ok(id) => id,
            Err(e) => {
                return Err(self
                    .fail(job, JobState::PersistenceFailed, PipelineError::Persistence(e))
                    .await)
            }
        };
        job.song_id = Some(song_id);
        self.transition(job, JobState::Persisted).await;

        info!(
            job_id = %job.job_id,
            song_id,
            title = %extraction.title,
            artist = %extraction.artist,
            album = %extraction.album,
            "Song record stored"
        );

        let accepted = AcceptedJob {
            job_id: job.job_id,
            song_id,
            title: extraction.title,
            artist: extraction.artist,
            album: extraction.album,
        };
        Ok((accepted, exited_at))
    }

    async fn reconcile(&self, job: &mut DownloadJob) {
        let (song_id, extraction) = match (job.song_id, job.extraction.clone()) {
            (Some(song_id), Some(extraction)) => (song_id, extraction),
            _ => {
                error!(job_id = %job.job_id, "Reconciliation started without a stored record");
                return;
            }
        };

        let located = self
            .inner
            .locator
            .locate_blocking(extraction.output_dir, extraction.artist, extraction.album)
            .await;

        let located = match located {
            Ok(located) => located,
            Err(e) => {
                if let Err(db_err) = self.inner.reconciler.record_locate_failure(song_id, &e).await
                {
                    error!(
                        job_id = %job.job_id,
                        song_id,
                        error = %db_err,
                        "Failed to record locate failure"
                    );
                }
                self.finish_failed(job, JobState::LocateFailed, e.to_string())
                    .await;
                return;
            }
        };

        match self
            .inner
            .reconciler
            .link(&RecordKey::Id(song_id), &located.filename)
            .await
        {
            Ok(LinkOutcome::Linked) => {
                job.filename = Some(located.filename.clone());
                self.inner.event_bus.emit_lossy(JobEvent::SongLinked {
                    job_id: job.job_id,
                    song_id,
                    filename: located.filename.clone(),
                    timestamp: Utc::now(),
                });
                self.transition(job, JobState::Linked).await;
                info!(
                    job_id = %job.job_id,
                    song_id,
                    filename = %located.filename,
                    "Song record linked to file"
                );
            }
            Ok(LinkOutcome::NoMatchingRecord) => {
                let message = format!(
                    "Located {} but song record {} was no longer awaiting a file",
                    located.filename, song_id
                );
                self.finish_failed(job, JobState::LocateFailed, message).await;
            }
            Err(e) => {
                let message = format!("Failed to record filename {}: {}", located.filename, e);
                self.finish_failed(job, JobState::LocateFailed, message).await;
            }
        }
    }

    async fn fail(
        &self,
        job: &mut DownloadJob,
        state: JobState,
        error: PipelineError,
    ) -> JobFailure {
        self.finish_failed(job, state, error.to_string()).await;
        JobFailure {
            job_id: job.job_id,
            state,
            error,
        }
    }

    async fn finish_failed(&self, job: &mut DownloadJob, state: JobState, message: String) {
        warn!(job_id = %job.job_id, state = ?state, error = %message, "Download job failed");
        let transition = job.fail(state, message);
        self.announce(job, transition).await;
    }

    async fn transition(&self, job: &mut DownloadJob, new_state: JobState) {
        let transition = job.transition_to(new_state);
        self.announce(job, transition).await;
    }

    /// Broadcast a transition, then publish the new snapshot
    async fn announce(&self, job: &DownloadJob, transition: StateTransition) {
        debug!(
            job_id = %job.job_id,
            old_state = ?transition.old_state,
            new_state = ?transition.new_state,
            "Job state changed"
        );

        self.inner.event_bus.emit_lossy(JobEvent::JobStateChanged {
            job_id: transition.job_id,
            old_state: transition.old_state,
            new_state: transition.new_state,
            message: if transition.new_state.is_terminal() {
                job.error.clone()
            } else {
                None
            },
            timestamp: transition.transitioned_at,
        });
        self.inner.registry.publish(job.snapshot()).await;
    }
}
