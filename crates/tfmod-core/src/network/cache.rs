//! Time-boxed response cache keyed by request URL.

use crate::config::NetworkConfig;
use bytes::Bytes;
use mini_moka::sync::Cache;
use std::time::Duration;

/// A cached response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedBody {
    Plain(Bytes),
    /// One page of a paginated listing and the link to the following page.
    Page { body: Bytes, next: Option<String> },
}

/// In-memory response cache with a fixed time-to-live.
pub struct ResponseCache {
    entries: Cache<String, CachedBody>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(NetworkConfig::CACHE_MAX_ENTRIES)
                .build(),
        }
    }

    pub fn get_plain(&self, url: &str) -> Option<Bytes> {
        match self.entries.get(&url.to_string()) {
            Some(CachedBody::Plain(body)) => Some(body),
            _ => None,
        }
    }

    pub fn get_page(&self, url: &str) -> Option<(Bytes, Option<String>)> {
        match self.entries.get(&url.to_string()) {
            Some(CachedBody::Page { body, next }) => Some((body, next)),
            _ => None,
        }
    }

    pub fn insert(&self, url: &str, body: CachedBody) {
        self.entries.insert(url.to_string(), body);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(NetworkConfig::CACHE_TTL)
    }
}
