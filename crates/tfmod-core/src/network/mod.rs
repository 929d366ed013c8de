//! Rate-limited, caching access to the upstream source host.

pub mod cache;
pub mod client;
pub mod github;
pub mod rate_limit;

pub use cache::{CachedBody, ResponseCache};
pub use client::{parse_next_link, HttpClient};
pub use github::{GitHubClient, GitHubRepo};
pub use rate_limit::TokenBucket;
