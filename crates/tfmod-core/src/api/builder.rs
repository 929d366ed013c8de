//! Builder for configuring TfmodApi initialization.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AppConfig, NetworkConfig, SyncConfig};
use crate::crawler::RepositorySource;
use crate::error::{Result, TfmodError};
use crate::network::{GitHubClient, HttpClient};
use crate::query::QueryEngine;
use crate::store::{SqliteStore, Store};
use crate::sync::{JobRegistry, Syncer};
use crate::TfmodApi;

/// Builder for configuring TfmodApi initialization.
///
/// # Example
///
/// ```rust,ignore
/// use tfmod_core::TfmodApi;
///
/// let api = TfmodApi::builder("./index.db")
///     .org("cloudnationhq")
///     .token(std::env::var("GITHUB_TOKEN").ok())
///     .worker_count(8)
///     .build()?;
/// ```
pub struct TfmodApiBuilder {
    db_path: PathBuf,
    org: String,
    token: Option<String>,
    worker_count: usize,
    module_prefix: String,
    api_base: String,
    auto_create_dirs: bool,
    source: Option<Arc<dyn RepositorySource>>,
}

impl TfmodApiBuilder {
    /// Create a new builder for the database file at `db_path`.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            org: AppConfig::DEFAULT_ORGANIZATION.to_string(),
            token: None,
            worker_count: SyncConfig::DEFAULT_WORKER_COUNT,
            module_prefix: SyncConfig::MODULE_PREFIX.to_string(),
            api_base: NetworkConfig::GITHUB_API_BASE.to_string(),
            auto_create_dirs: true,
            source: None,
        }
    }

    /// Organization to crawl.
    ///
    /// Default: `cloudnationhq`
    pub fn org(mut self, org: impl Into<String>) -> Self {
        self.org = org.into();
        self
    }

    /// GitHub token. Blank tokens are treated as absent.
    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Concurrent repository workers per sync pass. Zero means one.
    ///
    /// Default: `4`
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    /// Repository name prefix that marks a module repository.
    ///
    /// Default: `terraform-azure-`
    pub fn module_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.module_prefix = prefix.into();
        self
    }

    /// Base URL of the GitHub REST API.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Create the database's parent directory if it does not exist.
    ///
    /// Default: `true`
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Crawl `source` instead of the GitHub host; the token and API base
    /// are then unused.
    pub fn with_source(mut self, source: Arc<dyn RepositorySource>) -> Self {
        self.source = Some(source);
        self
    }

    fn validate_api_base(base: &str) -> Result<String> {
        let parsed = url::Url::parse(base).map_err(|e| TfmodError::Config {
            message: format!("Invalid API base URL '{}': {}", base, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TfmodError::Config {
                message: format!("API base URL must be http or https: {}", base),
            });
        }
        Ok(base.trim_end_matches('/').to_string())
    }

    /// The store creates missing directories itself; refuse to when that is
    /// turned off.
    fn check_parent_dir(&self) -> Result<()> {
        if self.auto_create_dirs {
            return Ok(());
        }
        match self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) if !parent.exists() => Err(TfmodError::Config {
                message: format!("Database directory does not exist: {}", parent.display()),
            }),
            _ => Ok(()),
        }
    }

    /// Build the TfmodApi instance.
    ///
    /// Opens (or creates) the database and wires the crawler, the sync
    /// controller and the query engine to it. No network traffic happens
    /// until a sync job is started.
    pub fn build(self) -> Result<TfmodApi> {
        if self.org.trim().is_empty() {
            return Err(TfmodError::invalid_input("org", "organization must not be empty"));
        }
        self.check_parent_dir()?;

        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(&self.db_path)?);

        let source = match self.source {
            Some(source) => source,
            None => {
                let api_base = Self::validate_api_base(&self.api_base)?;
                let http = Arc::new(HttpClient::new(self.token)?);
                Arc::new(GitHubClient::with_api_base(http, api_base))
            }
        };

        let syncer = Syncer::new(Arc::clone(&store), source, self.org.trim())
            .with_worker_count(self.worker_count)
            .with_module_prefix(self.module_prefix);
        let query = QueryEngine::new(Arc::clone(&store));

        tracing::info!(
            "Opened module index at {} for organization {}",
            self.db_path.display(),
            syncer.org()
        );

        Ok(TfmodApi {
            db_path: self.db_path,
            store,
            syncer,
            jobs: Arc::new(JobRegistry::new()),
            query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_api_base() {
        assert_eq!(
            TfmodApiBuilder::validate_api_base("http://127.0.0.1:9000/").unwrap(),
            "http://127.0.0.1:9000"
        );
        assert!(TfmodApiBuilder::validate_api_base("not a url").is_err());
        assert!(TfmodApiBuilder::validate_api_base("ftp://example.com").is_err());
    }

    #[test]
    fn test_build_creates_parent_dir() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("nested").join("index.db");
        let api = TfmodApiBuilder::new(&db).token(Some("  ".into())).build().unwrap();
        assert!(db.exists());
        assert_eq!(api.org(), "cloudnationhq");
    }

    #[test]
    fn test_build_without_auto_create() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("missing").join("index.db");
        let err = TfmodApiBuilder::new(&db)
            .auto_create_dirs(false)
            .build()
            .unwrap_err();
        assert!(matches!(err, TfmodError::Config { .. }));
    }

    #[test]
    fn test_build_rejects_blank_org() {
        let temp = TempDir::new().unwrap();
        let err = TfmodApiBuilder::new(temp.path().join("index.db"))
            .org(" ")
            .build()
            .unwrap_err();
        assert!(matches!(err, TfmodError::InvalidInput { .. }));
    }
}
