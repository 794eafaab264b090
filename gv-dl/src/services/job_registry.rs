//! In-memory registry of download jobs
//!
//! Holds the latest [`JobSnapshot`] for every job this process accepted.
//! Each job has a watch channel so observers can wait for the next state
//! without polling. Finished jobs beyond [`MAX_RETAINED_JOBS`] are dropped
//! oldest first; jobs still in flight are never dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use crate::models::JobSnapshot;

/// Upper bound on finished jobs kept for status queries
pub const MAX_RETAINED_JOBS: usize = 1024;

#[derive(Default)]
struct Entries {
    jobs: HashMap<Uuid, watch::Sender<JobSnapshot>>,
    /// Registration order, oldest first
    order: VecDeque<Uuid>,
}

/// Shared job registry
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RwLock<Entries>>,
    max_retained: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_RETAINED_JOBS)
    }

    pub fn with_capacity(max_retained: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Entries::default())),
            max_retained,
        }
    }

    /// Add a new job
    pub async fn register(&self, snapshot: JobSnapshot) {
        let mut entries = self.inner.write().await;
        let job_id = snapshot.job_id;
        let (tx, _) = watch::channel(snapshot);
        entries.jobs.insert(job_id, tx);
        entries.order.push_back(job_id);
        Self::prune(&mut entries, self.max_retained);
    }

    /// Replace a job's snapshot and wake its watchers
    pub async fn publish(&self, snapshot: JobSnapshot) {
        let entries = self.inner.read().await;
        if let Some(tx) = entries.jobs.get(&snapshot.job_id) {
            tx.send_replace(snapshot);
        }
    }

    /// Latest snapshot for a job
    pub async fn get(&self, job_id: Uuid) -> Option<JobSnapshot> {
        let entries = self.inner.read().await;
        entries.jobs.get(&job_id).map(|tx| tx.borrow().clone())
    }

    /// Watch a job's snapshots
    pub async fn subscribe(&self, job_id: Uuid) -> Option<watch::Receiver<JobSnapshot>> {
        let entries = self.inner.read().await;
        entries.jobs.get(&job_id).map(|tx| tx.subscribe())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn prune(entries: &mut Entries, max_retained: usize) {
        let mut excess = entries.jobs.len().saturating_sub(max_retained);
        if excess == 0 {
            return;
        }

        let Entries { jobs, order } = entries;
        order.retain(|job_id| {
            if excess == 0 {
                return true;
            }
            let finished = jobs
                .get(job_id)
                .map(|tx| tx.borrow().state.is_terminal())
                .unwrap_or(true);
            if finished {
                jobs.remove(job_id);
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}
