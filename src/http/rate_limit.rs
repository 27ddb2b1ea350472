//! Request pacing
//!
//! A token bucket (governor) spreading page requests over a window, so a
//! walk stays under the source's published quota instead of tripping it.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Requests allowed per window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests per window, also the burst size
    pub requests: u32,
    /// Window length
    pub per: Duration,
}

impl RateLimiterConfig {
    /// `requests` per `per`
    pub fn new(requests: u32, per: Duration) -> Self {
        Self { requests, per }
    }

    /// `requests` per minute
    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }

    fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.requests).unwrap_or(NonZeroU32::MIN);
        let period = self.per / burst.get();
        Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }
}

/// Shared token bucket
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a limiter from config
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            limiter: Arc::new(Governor::direct(config.quota())),
        }
    }

    /// Wait for a permit
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a permit if one is free right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}
