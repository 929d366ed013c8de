//! Per-run sync counters.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Snapshot of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub total_repos: usize,
    /// Includes skipped and failed repositories.
    pub processed_repos: usize,
    pub skipped_repos: usize,
    pub current_repo: String,
    pub errors: Vec<String>,
    /// Repositories re-synced by an incremental run.
    pub updated_repos: Vec<String>,
}

impl SyncProgress {
    /// Repositories that finished without an error or a skip.
    pub fn succeeded(&self) -> usize {
        self.processed_repos
            .saturating_sub(self.skipped_repos)
            .saturating_sub(self.errors.len())
    }
}

/// Progress shared between the workers of a run and its job entry.
pub type SharedProgress = Arc<Mutex<SyncProgress>>;

pub fn shared_progress() -> SharedProgress {
    Arc::new(Mutex::new(SyncProgress::default()))
}

/// Lock shared progress, recovering the data if a holder panicked.
pub fn lock_progress(progress: &SharedProgress) -> MutexGuard<'_, SyncProgress> {
    progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded() {
        let progress = SyncProgress {
            total_repos: 5,
            processed_repos: 5,
            skipped_repos: 2,
            errors: vec!["Failed to sync x: boom".into()],
            ..Default::default()
        };
        assert_eq!(progress.succeeded(), 2);
    }

    #[test]
    fn test_lock_recovers_from_poison() {
        let progress = shared_progress();
        let clone = Arc::clone(&progress);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("worker died");
        })
        .join();

        lock_progress(&progress).processed_repos += 1;
        assert_eq!(lock_progress(&progress).processed_repos, 1);
    }
}
