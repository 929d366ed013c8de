//! Repository discovery and archive ingestion.

pub mod archive;

pub use archive::{ingest_archive, read_archive, ArchiveFile, IngestOutcome};

use crate::models::Module;
use crate::network::{GitHubClient, GitHubRepo};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// Upstream host the sync controller crawls.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Every repository of an organization, unfiltered.
    async fn list_repositories(&self, org: &str) -> Result<Vec<GitHubRepo>>;

    async fn fetch_readme(&self, full_name: &str) -> Result<String>;

    /// Gzipped tarball; `Unavailable` when the host refuses it.
    async fn fetch_archive(&self, full_name: &str) -> Result<Bytes>;

    /// Drop cached listing and readme responses.
    fn clear_cache(&self);

    /// Requests allowed per rate-limit window.
    fn rate_limit_capacity(&self) -> u32;
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn list_repositories(&self, org: &str) -> Result<Vec<GitHubRepo>> {
        self.list_org_repos(org).await
    }

    async fn fetch_readme(&self, full_name: &str) -> Result<String> {
        GitHubClient::fetch_readme(self, full_name).await
    }

    async fn fetch_archive(&self, full_name: &str) -> Result<Bytes> {
        self.download_archive(full_name).await
    }

    fn clear_cache(&self) {
        self.http().clear_cache();
    }

    fn rate_limit_capacity(&self) -> u32 {
        self.http().rate_limit_capacity()
    }
}

/// Keep public, unarchived, non-empty repositories whose name carries the
/// module prefix, in listing order.
pub fn filter_candidates(repos: Vec<GitHubRepo>, prefix: &str) -> Vec<GitHubRepo> {
    repos
        .into_iter()
        .filter(|repo| {
            if !repo.name.starts_with(prefix) {
                return false;
            }
            if repo.private {
                debug!("Skipping {} (private repository)", repo.name);
                return false;
            }
            if repo.archived {
                debug!("Skipping {} (archived repository)", repo.name);
                return false;
            }
            if repo.size <= 0 {
                debug!("Skipping {} (empty repository)", repo.name);
                return false;
            }
            true
        })
        .collect()
}

/// True when the stored marker equals the upstream one exactly.
pub fn is_up_to_date(stored: Option<&Module>, repo: &GitHubRepo) -> bool {
    stored.is_some_and(|module| module.last_updated == repo.updated_at)
}
