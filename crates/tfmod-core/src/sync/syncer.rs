//! Full and incremental sync passes over an organization's repositories.

use super::jobs::panic_message;
use super::progress::{lock_progress, shared_progress, SharedProgress, SyncProgress};
use crate::alias::{derive_aliases, derive_tags};
use crate::config::SyncConfig;
use crate::crawler::{filter_candidates, ingest_archive, is_up_to_date, RepositorySource};
use crate::indexer::index_file;
use crate::models::{FileType, ModuleUpsert};
use crate::network::GitHubRepo;
use crate::store::Store;
use crate::{Result, TfmodError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// How a repository pipeline ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoOutcome {
    Synced,
    /// The host refused the archive; the module row was removed.
    Unavailable,
}

/// Drives sync passes with a bounded worker pool.
#[derive(Clone)]
pub struct Syncer {
    store: Arc<dyn Store>,
    source: Arc<dyn RepositorySource>,
    org: String,
    worker_count: usize,
    module_prefix: String,
}

impl Syncer {
    pub fn new(store: Arc<dyn Store>, source: Arc<dyn RepositorySource>, org: impl Into<String>) -> Self {
        Self {
            store,
            source,
            org: org.into(),
            worker_count: SyncConfig::DEFAULT_WORKER_COUNT,
            module_prefix: SyncConfig::MODULE_PREFIX.to_string(),
        }
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_module_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.module_prefix = prefix.into();
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Workers for a batch: the configured pool capped by the rate-limit
    /// ceiling and the batch size, at least one for a non-empty batch.
    pub fn worker_count_for(&self, total: usize) -> usize {
        if total == 0 {
            return 0;
        }
        let mut count = if self.worker_count == 0 {
            SyncConfig::DEFAULT_WORKER_COUNT
        } else {
            self.worker_count
        };
        let ceiling = self.source.rate_limit_capacity() as usize;
        if ceiling > 0 {
            count = count.min(ceiling);
        }
        count.min(total).max(1)
    }

    async fn discover(&self) -> Result<Vec<GitHubRepo>> {
        info!("Fetching repositories for {}", self.org);
        let repos = self.source.list_repositories(&self.org).await?;
        let candidates = filter_candidates(repos, &self.module_prefix);
        info!("Found {} candidate repositories", candidates.len());
        Ok(candidates)
    }

    /// Sync every candidate repository.
    pub async fn sync_all(&self) -> Result<SyncProgress> {
        let progress = shared_progress();
        self.run_full(&progress).await?;
        let snapshot = lock_progress(&progress).clone();
        Ok(snapshot)
    }

    /// Sync only repositories whose upstream marker changed.
    pub async fn sync_updates(&self) -> Result<SyncProgress> {
        let progress = shared_progress();
        self.run_incremental(&progress).await?;
        let snapshot = lock_progress(&progress).clone();
        Ok(snapshot)
    }

    /// Full pass reporting into shared progress.
    pub async fn run_full(&self, progress: &SharedProgress) -> Result<()> {
        let repos = self.discover().await?;
        lock_progress(progress).total_repos = repos.len();

        self.process_queue(repos, progress, false).await;

        let snapshot = lock_progress(progress).clone();
        info!(
            "Sync completed: {}/{} repositories synced successfully",
            snapshot.succeeded(),
            snapshot.total_repos
        );
        Ok(())
    }

    /// Incremental pass reporting into shared progress.
    pub async fn run_incremental(&self, progress: &SharedProgress) -> Result<()> {
        self.source.clear_cache();
        let repos = self.discover().await?;
        lock_progress(progress).total_repos = repos.len();

        let mut to_sync = Vec::with_capacity(repos.len());
        for repo in repos {
            lock_progress(progress).current_repo = repo.name.clone();
            let stored = match self.store.get_module(&repo.name) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Lookup of {} failed ({}), will sync", repo.name, e);
                    None
                }
            };
            if is_up_to_date(stored.as_ref(), &repo) {
                debug!("Skipping {} (already up-to-date)", repo.name);
                let mut p = lock_progress(progress);
                p.skipped_repos += 1;
                p.processed_repos += 1;
                continue;
            }
            to_sync.push(repo);
        }

        self.process_queue(to_sync, progress, true).await;

        let snapshot = lock_progress(progress).clone();
        info!(
            "Sync completed: {}/{} repositories synced, {} skipped (up-to-date), {} errors",
            snapshot.updated_repos.len(),
            snapshot.total_repos,
            snapshot.skipped_repos,
            snapshot.errors.len()
        );
        Ok(())
    }

    async fn process_queue(&self, repos: Vec<GitHubRepo>, progress: &SharedProgress, record_updates: bool) {
        let workers = self.worker_count_for(repos.len());
        if workers == 0 {
            return;
        }
        debug!("Processing {} repositories with {} workers", repos.len(), workers);

        let total = lock_progress(progress).total_repos;
        let offset = lock_progress(progress).processed_repos;
        let started = Arc::new(AtomicUsize::new(0));
        let queue = Arc::new(Mutex::new(VecDeque::from(repos)));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let syncer = self.clone();
                let queue = Arc::clone(&queue);
                let progress = Arc::clone(progress);
                let started = Arc::clone(&started);
                tokio::spawn(async move {
                    loop {
                        let next = queue
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .pop_front();
                        let Some(repo) = next else {
                            break;
                        };
                        let seq = offset + started.fetch_add(1, Ordering::SeqCst) + 1;
                        info!("Syncing repository: {} ({}/{})", repo.name, seq, total);
                        syncer.handle_repo(repo, &progress, record_updates).await;
                    }
                })
            })
            .collect();

        for handle in futures::future::join_all(handles).await {
            if let Err(e) = handle {
                warn!("Sync worker exited abnormally: {}", e);
            }
        }
    }

    async fn handle_repo(&self, repo: GitHubRepo, progress: &SharedProgress, record_updates: bool) {
        lock_progress(progress).current_repo = repo.name.clone();

        let syncer = self.clone();
        let task_repo = repo.clone();
        let result = match tokio::spawn(async move { syncer.sync_repository(&task_repo).await }).await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => Err(TfmodError::Other(format!(
                "panic: {}",
                panic_message(join_error.into_panic())
            ))),
            Err(join_error) => Err(TfmodError::Other(join_error.to_string())),
        };

        let mut p = lock_progress(progress);
        p.processed_repos += 1;
        p.current_repo = repo.name.clone();
        match result {
            Ok(RepoOutcome::Synced) => {
                if record_updates {
                    p.updated_repos.push(repo.name);
                }
            }
            Ok(RepoOutcome::Unavailable) => {}
            Err(e) => {
                let message = format!("Failed to sync {}: {}", repo.name, e);
                warn!("{}", message);
                p.errors.push(message);
            }
        }
    }

    /// Run the full pipeline for one repository.
    pub async fn sync_repository(&self, repo: &GitHubRepo) -> Result<RepoOutcome> {
        let store = self.store.as_ref();
        let module_id = store.upsert_module(&ModuleUpsert {
            name: repo.name.clone(),
            full_name: repo.full_name.clone(),
            description: repo.description.clone(),
            repo_url: repo.html_url.clone(),
            last_updated: repo.updated_at.clone(),
            ..Default::default()
        })?;

        if let Err(e) = store
            .clear_module_data(module_id)
            .and_then(|_| store.delete_child_modules(&repo.name))
        {
            warn!("Failed to clear old data for {}: {}", repo.name, e);
        }

        match self.source.fetch_readme(&repo.full_name).await {
            Ok(readme) => {
                if let Err(e) = store.update_readme(module_id, &readme) {
                    warn!("Failed to store README for {}: {}", repo.name, e);
                }
            }
            Err(e) => warn!("Failed to fetch README for {}: {}", repo.name, e),
        }

        let archive = match self.source.fetch_archive(&repo.full_name).await {
            Ok(archive) => archive,
            Err(e) if e.is_unavailable() => {
                info!("Skipping {}: repository content unavailable", repo.name);
                if let Err(e) = store.delete_module(module_id) {
                    warn!("Failed to delete module record for {}: {}", repo.name, e);
                }
                return Ok(RepoOutcome::Unavailable);
            }
            Err(e) => return Err(e),
        };

        let outcome = ingest_archive(store, module_id, repo, &archive)?;

        let module_ids: Vec<i64> = std::iter::once(module_id)
            .chain(outcome.submodule_ids.iter().copied())
            .collect();
        for id in &module_ids {
            if let Err(e) = self.index_module(*id) {
                warn!("Failed to index terraform files of {} ({}): {}", repo.name, id, e);
            }
        }

        if outcome.has_examples {
            if let Err(e) = store.set_has_examples(module_id, true) {
                warn!("Failed to flag {} as having examples: {}", repo.name, e);
            }
        }

        for id in &module_ids {
            if let Err(e) = self.persist_tags(*id) {
                warn!("Failed to persist tags for {} ({}): {}", repo.name, id, e);
            }
        }
        for id in &module_ids {
            if let Err(e) = self.persist_aliases(*id) {
                warn!("Failed to persist aliases for {} ({}): {}", repo.name, id, e);
            }
        }

        Ok(RepoOutcome::Synced)
    }

    /// Parse and index every terraform file of a module.
    fn index_module(&self, module_id: i64) -> Result<()> {
        let files = self.store.module_files(module_id)?;
        for file in files.iter().filter(|f| f.file_type == FileType::Terraform) {
            match index_file(module_id, file) {
                Ok(index) => {
                    if let Err(e) = self.store.insert_file_index(&index) {
                        warn!("Failed to store index rows for {}: {}", file.file_path, e);
                    }
                }
                Err(e) => warn!("Failed to parse {}: {}", file.file_path, e),
            }
        }
        Ok(())
    }

    fn persist_tags(&self, module_id: i64) -> Result<()> {
        let module = self
            .store
            .get_module_by_id(module_id)?
            .ok_or_else(|| TfmodError::not_found("module", module_id.to_string()))?;
        let resources = self.store.module_resources(module_id)?;
        let tags = derive_tags(&module.name, resources.iter().map(|r| r.resource_type.as_str()));
        self.store.replace_tags(module_id, &tags)
    }

    fn persist_aliases(&self, module_id: i64) -> Result<()> {
        let module = self
            .store
            .get_module_by_id(module_id)?
            .ok_or_else(|| TfmodError::not_found("module", module_id.to_string()))?;
        let tags = self.store.module_tags(module_id)?;
        let aliases = derive_aliases(&module.name, &tags);
        self.store.replace_aliases(module_id, &aliases)
    }
}

impl std::fmt::Debug for Syncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Syncer")
            .field("org", &self.org)
            .field("worker_count", &self.worker_count)
            .field("module_prefix", &self.module_prefix)
            .finish()
    }
}
