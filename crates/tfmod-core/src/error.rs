//! Error types for the module indexer.
//!
//! Sync failures are isolated per repository and query failures surface as
//! `NotFound` or empty results, so most callers only ever match on a handful
//! of these variants.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the indexer and query engine.
#[derive(Debug, Error)]
pub enum TfmodError {
    // Lookup misses
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid input for {field}: {message}")]
    InvalidInput { field: String, message: String },

    // Upstream host
    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Repository content unavailable for {repository} (status {status})")]
    Unavailable { repository: String, status: u16 },

    #[error("GitHub API error: {message}")]
    GitHubApi {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout: {0}")]
    Timeout(String),

    // Source parsing
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Archive error: {message}")]
    Archive {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Storage
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for indexer operations.
pub type Result<T> = std::result::Result<T, TfmodError>;

impl From<std::io::Error> for TfmodError {
    fn from(err: std::io::Error) -> Self {
        TfmodError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for TfmodError {
    fn from(err: serde_json::Error) -> Self {
        TfmodError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for TfmodError {
    fn from(err: rusqlite::Error) -> Self {
        TfmodError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for TfmodError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TfmodError::Timeout(err.to_string())
        } else {
            TfmodError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl From<base64::DecodeError> for TfmodError {
    fn from(err: base64::DecodeError) -> Self {
        TfmodError::Other(format!("Invalid base64 payload: {}", err))
    }
}

impl TfmodError {
    /// Shorthand for a lookup miss.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        TfmodError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for a rejected argument.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        TfmodError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Error for a poisoned connection or registry lock.
    pub fn lock_poisoned(what: &str) -> Self {
        TfmodError::Database {
            message: format!("Failed to acquire {} lock", what),
            source: None,
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// - -32602: invalid params
    /// - -32603: internal error
    /// - -32000: upstream host or network failure
    /// - -32001: lookup miss
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            TfmodError::InvalidInput { .. } => -32602,

            TfmodError::NotFound { .. } => -32001,

            TfmodError::Network { .. }
            | TfmodError::Timeout(_)
            | TfmodError::RateLimited { .. }
            | TfmodError::Unavailable { .. }
            | TfmodError::GitHubApi { .. } => -32000,

            _ => -32603,
        }
    }

    /// Check if this error is transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TfmodError::Network { .. } | TfmodError::Timeout(_) | TfmodError::RateLimited { .. }
        )
    }

    /// Archive fetch answered with a forbidden/not-found/conflict status.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TfmodError::Unavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TfmodError::NotFound { .. })
    }
}
