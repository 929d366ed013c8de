//! Centralized configuration for the module indexer.
//!
//! Constants for upstream access, sync passes and query defaults. Runtime
//! settings (database path, organization, token) live on `TfmodApiBuilder`.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "tfmod-index";
    pub const DEFAULT_ORGANIZATION: &'static str = "cloudnationhq";
    pub const DEFAULT_DB_FILE: &'static str = "index.db";
}

/// Upstream source host configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const GITHUB_API_BASE: &'static str = "https://api.github.com";
    pub const GITHUB_MEDIA_TYPE: &'static str = "application/vnd.github.v3+json";
    pub const USER_AGENT: &'static str = concat!("tfmod-index/", env!("CARGO_PKG_VERSION"));
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const REPOS_PER_PAGE: u32 = 100;

    // Response cache
    pub const CACHE_TTL: Duration = Duration::from_secs(600);
    pub const CACHE_MAX_ENTRIES: u64 = 1024;

    // Token bucket
    pub const ANONYMOUS_RATE_LIMIT: u32 = 60;
    pub const AUTHENTICATED_RATE_LIMIT: u32 = 5000;
    pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(3600);
}

/// Sync pass configuration.
pub struct SyncConfig;

impl SyncConfig {
    pub const DEFAULT_WORKER_COUNT: usize = 4;
    pub const MODULE_PREFIX: &'static str = "terraform-azure-";
    pub const IGNORED_PATH_SEGMENTS: &'static [&'static str] =
        &[".git", ".github", "node_modules", ".terraform"];
    pub const SUBMODULE_DIR: &'static str = "modules";
    pub const EXAMPLES_DIR: &'static str = "examples";
}

/// Query engine defaults.
pub struct QueryConfig;

impl QueryConfig {
    pub const DEFAULT_RELATIONSHIP_LIMIT: usize = 20;
    pub const DEFAULT_MODULE_SEARCH_LIMIT: usize = 10;
    pub const DEFAULT_CODE_SEARCH_LIMIT: usize = 20;
    pub const DEFAULT_FULL_BLOCK_LIMIT: usize = 20;
    pub const SUMMARY_TOP_TYPES: usize = 5;
}
