//! Sync controller: passes, progress and detached jobs.

pub mod jobs;
pub mod progress;
pub mod syncer;

pub use jobs::{JobKind, JobRegistry, JobStatus, SyncJob};
pub use progress::{SharedProgress, SyncProgress};
pub use syncer::{RepoOutcome, Syncer};
