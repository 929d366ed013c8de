//! Fixed-window token bucket.
//!
//! The bucket starts full and refills completely once the current window has
//! elapsed. There is no partial refill and `acquire` never waits: a caller
//! that finds the bucket empty gets `RateLimited` back immediately.

use crate::config::NetworkConfig;
use crate::{Result, TfmodError};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

struct BucketState {
    tokens: u32,
    refill_at: Instant,
}

/// Shared request budget for one upstream host.
pub struct TokenBucket {
    service: String,
    capacity: u32,
    window: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(service: impl Into<String>, capacity: u32, window: Duration) -> Self {
        Self {
            service: service.into(),
            capacity,
            window,
            state: Mutex::new(BucketState {
                tokens: capacity,
                refill_at: Instant::now() + window,
            }),
        }
    }

    /// Budget for the GitHub API, sized by whether a token is configured.
    pub fn for_github(authenticated: bool) -> Self {
        let capacity = if authenticated {
            NetworkConfig::AUTHENTICATED_RATE_LIMIT
        } else {
            NetworkConfig::ANONYMOUS_RATE_LIMIT
        };
        Self::new("github", capacity, NetworkConfig::RATE_LIMIT_WINDOW)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Take one token, or fail with the seconds left in the window.
    pub fn acquire(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TfmodError::lock_poisoned("rate limiter"))?;

        let now = Instant::now();
        if now >= state.refill_at {
            state.tokens = self.capacity;
            state.refill_at = now + self.window;
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            return Ok(());
        }

        let retry_after = state.refill_at.saturating_duration_since(now).as_secs();
        warn!(
            "Request budget for {} exhausted, refills in {}s",
            self.service, retry_after
        );
        Err(TfmodError::RateLimited {
            service: self.service.clone(),
            retry_after_secs: Some(retry_after),
        })
    }

    /// Tokens left in the current window.
    pub fn remaining(&self) -> u32 {
        self.state.lock().map(|s| s.tokens).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_by_credentials() {
        assert_eq!(TokenBucket::for_github(false).capacity(), 60);
        assert_eq!(TokenBucket::for_github(true).capacity(), 5000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_fails_immediately() {
        let bucket = TokenBucket::new("github", 2, Duration::from_secs(3600));
        assert!(bucket.acquire().is_ok());
        assert!(bucket.acquire().is_ok());
        assert_eq!(bucket.remaining(), 0);

        match bucket.acquire() {
            Err(TfmodError::RateLimited {
                service,
                retry_after_secs,
            }) => {
                assert_eq!(service, "github");
                assert_eq!(retry_after_secs, Some(3600));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_partial_refill() {
        let bucket = TokenBucket::new("github", 3, Duration::from_secs(3600));
        for _ in 0..3 {
            bucket.acquire().unwrap();
        }

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert!(bucket.acquire().is_err());
        assert_eq!(bucket.remaining(), 0);

        tokio::time::advance(Duration::from_secs(1801)).await;
        assert!(bucket.acquire().is_ok());
        assert_eq!(bucket.remaining(), 2);
    }
}
