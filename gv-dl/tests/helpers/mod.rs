//! Test Helper Utilities
//!
//! Shared utilities for testing gv-dl: a scripted downloader, a coordinator
//! wired to a temporary root folder, and waiting on job states.

#![allow(dead_code)]

use async_trait::async_trait;
use gv_common::db::init_database;
use gv_common::events::{EventBus, JobState};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use gv_dl::models::JobSnapshot;
use gv_dl::services::{
    CoordinatorSettings, JobCoordinator, MarkerExtractor, ProcessOutput, ProcessRunner, SpawnError,
};

/// Downloader output carrying every marker
pub fn marker_output(output_dir: &Path, title: &str, artist: &str, album: &str) -> String {
    format!(
        "Checking directory permissions...[done]\n\
         ➤ Title: {}\n\
         ➤ Artist: {}\n\
         ➤ Album: {}\n\
         ➤ Year: 2019\n\
         Output directory: [{}]\n\
         [•] Download Complete\n",
        title,
        artist,
        album,
        output_dir.display()
    )
}

/// Write an audio file at `<media>/<artist>/<album>/<name>`
pub fn write_track(media_dir: &Path, artist: &str, album: &str, name: &str) -> PathBuf {
    let dir = media_dir.join(artist).join(album);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, b"ID3").unwrap();
    path
}

enum Script {
    Output(String),
    Exit(i32, String),
    LaunchFailure,
}

/// ProcessRunner that replays a fixed outcome
///
/// `{media_dir}` in scripted output is replaced with the media dir the run
/// was given.
pub struct ScriptedRunner {
    script: Script,
    /// Written relative to the media dir before the run returns
    creates: Option<PathBuf>,
    delay: Duration,
    urls: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedRunner {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            creates: None,
            delay: Duration::ZERO,
            urls: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    /// Exit 0 printing `text`
    pub fn printing(text: impl Into<String>) -> Self {
        Self::with_script(Script::Output(text.into()))
    }

    /// Exit non-zero printing `text`
    pub fn exiting(code: i32, text: impl Into<String>) -> Self {
        Self::with_script(Script::Exit(code, text.into()))
    }

    /// Program cannot be started
    pub fn unlaunchable() -> Self {
        Self::with_script(Script::LaunchFailure)
    }

    /// Create a file (relative to the media dir) as the "download"
    pub fn creating(mut self, relative: impl Into<PathBuf>) -> Self {
        self.creates = Some(relative.into());
        self
    }

    /// Keep the process "running" for `delay`
    pub fn taking(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Highest number of runs observed at the same time
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, url: &str, media_dir: &Path) -> Result<ProcessOutput, SpawnError> {
        self.urls.lock().unwrap().push(url.to_string());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if let Some(relative) = &self.creates {
            let path = media_dir.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"ID3").unwrap();
        }

        match &self.script {
            Script::Output(text) => Ok(ProcessOutput {
                exit_code: Some(0),
                text: text.replace("{media_dir}", &media_dir.to_string_lossy()),
            }),
            Script::Exit(code, text) => Err(SpawnError::ExitStatus {
                program: "scripted".to_string(),
                exit_code: Some(*code),
                output: text.clone(),
            }),
            Script::LaunchFailure => Err(SpawnError::Launch {
                program: "scripted".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
            }),
        }
    }
}

/// Temporary root folder with a database, media dir and coordinator
pub struct TestEnv {
    pub temp: TempDir,
    pub db: SqlitePool,
    pub media_dir: PathBuf,
    pub diagnostic_log: PathBuf,
    pub event_bus: EventBus,
    pub coordinator: JobCoordinator,
}

impl TestEnv {
    pub async fn new(runner: Arc<dyn ProcessRunner>, settle_delay: Duration) -> Self {
        Self::with_concurrency(runner, settle_delay, 4).await
    }

    pub async fn with_concurrency(
        runner: Arc<dyn ProcessRunner>,
        settle_delay: Duration,
        max_concurrent_downloads: usize,
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let db = init_database(&temp.path().join("gv.db")).await.unwrap();
        let media_dir = temp.path().join("media");
        std::fs::create_dir_all(&media_dir).unwrap();
        let diagnostic_log = temp.path().join("downloader_output.log");
        let event_bus = EventBus::new(100);

        let coordinator = JobCoordinator::new(
            db.clone(),
            runner,
            Arc::new(MarkerExtractor::new(diagnostic_log.clone())),
            event_bus.clone(),
            CoordinatorSettings {
                media_dir: media_dir.clone(),
                settle_delay,
                max_concurrent_downloads,
            },
        );

        Self {
            temp,
            db,
            media_dir,
            diagnostic_log,
            event_bus,
            coordinator,
        }
    }
}

/// Wait until the job reaches a terminal state
pub async fn wait_for_terminal(coordinator: &JobCoordinator, job_id: Uuid) -> JobSnapshot {
    let mut rx = coordinator
        .subscribe(job_id)
        .await
        .expect("job should be registered");

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.state.is_terminal() {
                return snapshot;
            }
            rx.changed().await.expect("job registry dropped");
        }
    })
    .await
    .expect("job did not finish in time")
}

/// Assert a job finished in `expected`
pub async fn assert_finishes_in(
    coordinator: &JobCoordinator,
    job_id: Uuid,
    expected: JobState,
) -> JobSnapshot {
    let snapshot = wait_for_terminal(coordinator, job_id).await;
    assert_eq!(snapshot.state, expected, "job snapshot: {:?}", snapshot);
    snapshot
}
