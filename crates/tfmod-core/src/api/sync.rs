//! Sync job methods.

use crate::error::{Result, TfmodError};
use crate::sync::{JobKind, SyncJob, SyncProgress};
use crate::TfmodApi;

impl TfmodApi {
    /// Start a full sync of every module repository as a detached job and
    /// return its id.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn sync_modules(&self) -> String {
        let syncer = self.syncer.clone();
        self.jobs.start(JobKind::FullSync, move |progress| async move {
            syncer.run_full(&progress).await
        })
    }

    /// Start an incremental sync that only re-fetches repositories whose
    /// upstream marker changed.
    pub fn sync_updates_modules(&self) -> String {
        let syncer = self.syncer.clone();
        self.jobs.start(JobKind::IncrementalSync, move |progress| async move {
            syncer.run_incremental(&progress).await
        })
    }

    /// Run a full sync inline and return its final counters.
    pub async fn sync_now(&self) -> Result<SyncProgress> {
        self.syncer.sync_all().await
    }

    /// Run an incremental sync inline.
    pub async fn sync_updates_now(&self) -> Result<SyncProgress> {
        self.syncer.sync_updates().await
    }

    pub fn get_sync_job(&self, job_id: &str) -> Result<SyncJob> {
        self.jobs
            .get(job_id)
            .ok_or_else(|| TfmodError::not_found("Job", job_id))
    }

    /// Every job started by this process, newest first.
    pub fn list_sync_jobs(&self) -> Vec<SyncJob> {
        self.jobs.list()
    }
}
