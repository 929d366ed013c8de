//! tfmod-core - Headless indexer and query engine for Terraform module
//! repositories.
//!
//! The crate crawls a GitHub organization for module repositories, parses
//! their HCL into a structural index stored in SQLite, and answers lookups,
//! pattern comparisons and relationship questions over that index. It has
//! no RPC layer of its own; see the `tfmod-rpc` crate for that.
//!
//! # Example
//!
//! ```rust,ignore
//! use tfmod_core::TfmodApi;
//!
//! #[tokio::main]
//! async fn main() -> tfmod_core::Result<()> {
//!     let api = TfmodApi::builder("index.db").org("cloudnationhq").build()?;
//!
//!     let job_id = api.sync_modules();
//!     println!("Started {}", job_id);
//!
//!     for module in api.search_modules("key vault", 5).await? {
//!         println!("{}", module.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod alias;
pub mod config;
pub mod crawler;
pub mod error;
pub mod hcl;
pub mod indexer;
pub mod models;
pub mod network;
pub mod query;
pub mod store;
pub mod sync;

mod api;

pub use api::TfmodApiBuilder;
pub use crawler::RepositorySource;
pub use error::{Result, TfmodError};
pub use models::{
    ExampleContent, FileHit, Module, ModuleExamples, ModuleInfo, PatternPage, RelationshipReport,
    VariableDefinition,
};
pub use query::{CodeSearch, PatternQuery, QueryEngine, RelationshipRequest};
pub use store::{SqliteStore, Store};
pub use sync::{JobKind, JobStatus, SyncJob, SyncProgress, Syncer};

use std::path::PathBuf;
use std::sync::Arc;
use crate::sync::JobRegistry;

/// Main entry point for indexing and querying modules.
///
/// Sync passes run as detached jobs tracked in memory; queries read the
/// store directly and are not blocked by a running sync.
pub struct TfmodApi {
    db_path: PathBuf,
    store: Arc<dyn Store>,
    syncer: Syncer,
    jobs: Arc<JobRegistry>,
    query: QueryEngine,
}

impl TfmodApi {
    /// Create a builder for a database at `db_path`.
    pub fn builder(db_path: impl Into<PathBuf>) -> TfmodApiBuilder {
        TfmodApiBuilder::new(db_path)
    }

    /// Open an API with default settings.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(db_path).build()
    }

    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Organization crawled by sync passes.
    pub fn org(&self) -> &str {
        self.syncer.org()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn query_engine(&self) -> &QueryEngine {
        &self.query
    }
}

impl std::fmt::Debug for TfmodApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfmodApi")
            .field("db_path", &self.db_path)
            .field("org", &self.org())
            .finish_non_exhaustive()
    }
}
