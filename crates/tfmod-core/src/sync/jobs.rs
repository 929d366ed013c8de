//! In-memory registry of detached sync jobs.
//!
//! Jobs live for the lifetime of the process; nothing is persisted.

use super::progress::{lock_progress, shared_progress, SharedProgress, SyncProgress};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    FullSync,
    IncrementalSync,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FullSync => "full_sync",
            JobKind::IncrementalSync => "incremental_sync",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// Public view of a sync job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: SyncProgress,
    pub error: Option<String>,
}

struct JobEntry {
    job: SyncJob,
    live: SharedProgress,
}

impl JobEntry {
    fn snapshot(&self) -> SyncJob {
        let mut job = self.job.clone();
        job.progress = lock_progress(&self.live).clone();
        job
    }
}

/// Text carried by a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Thread-safe job registry.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, JobEntry>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_id(jobs: &HashMap<String, JobEntry>, kind: JobKind, now: DateTime<Utc>) -> String {
        let mut nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros() * 1000);
        loop {
            let id = format!("{}-{}", kind.as_str(), nanos);
            if !jobs.contains_key(&id) {
                return id;
            }
            nanos += 1;
        }
    }

    /// Register a running job and drive `run` on a detached task.
    ///
    /// Returns the job id immediately. The job completes when `run` returns
    /// `Ok`, fails with the error text when it returns `Err`, and fails with
    /// `panic: <message>` when it panics.
    pub fn start<F, Fut>(self: &Arc<Self>, kind: JobKind, run: F) -> String
    where
        F: FnOnce(SharedProgress) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let live = shared_progress();
        let started_at = Utc::now();

        let id = {
            let mut jobs = self.jobs();
            let id = Self::next_id(&jobs, kind, started_at);
            jobs.insert(
                id.clone(),
                JobEntry {
                    job: SyncJob {
                        id: id.clone(),
                        kind,
                        status: JobStatus::Running,
                        started_at,
                        completed_at: None,
                        progress: SyncProgress::default(),
                        error: None,
                    },
                    live: Arc::clone(&live),
                },
            );
            id
        };
        info!("Started {} job {}", kind.as_str(), id);

        let task = tokio::spawn(run(live));
        let registry = Arc::clone(self);
        let job_id = id.clone();
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(join_error) if join_error.is_panic() => {
                    Err(format!("panic: {}", panic_message(join_error.into_panic())))
                }
                Err(join_error) => Err(join_error.to_string()),
            };
            registry.finish(&job_id, outcome);
        });

        id
    }

    fn finish(&self, id: &str, outcome: std::result::Result<(), String>) {
        let mut jobs = self.jobs();
        let Some(entry) = jobs.get_mut(id) else {
            return;
        };
        entry.job.completed_at = Some(Utc::now());
        match outcome {
            Ok(()) => {
                entry.job.status = JobStatus::Completed;
                info!("Job {} completed", id);
            }
            Err(message) => {
                error!("Job {} failed: {}", id, message);
                entry.job.status = JobStatus::Failed;
                entry.job.error = Some(message);
            }
        }
    }

    /// Snapshot of one job, with live progress while it runs.
    pub fn get(&self, id: &str) -> Option<SyncJob> {
        self.jobs().get(id).map(JobEntry::snapshot)
    }

    /// Every job, newest first.
    pub fn list(&self) -> Vec<SyncJob> {
        let mut jobs: Vec<SyncJob> = self.jobs().values().map(JobEntry::snapshot).collect();
        jobs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
