//! Per-client token-bucket admission control.
//!
//! Grounded on the server's security middleware rate limiter (lazy
//! per-key entry creation, `DashMap`-backed concurrent map) but reworked
//! from fixed-window counting to a token bucket: fixed windows let a
//! client burst twice its rate at a window boundary, which a bucket with
//! continuous refill does not.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Sustained tokens/second.
    pub rate: f64,
    /// Maximum burst size (bucket capacity).
    pub burst: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, rate: f64, burst: f64, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst);
        self.last_refill = now;
    }
}

/// Buckets are created lazily on first request per key and retained for
/// the process lifetime; no background eviction is required for the core
/// spec's scale.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self { buckets: DashMap::new(), config }
    }

    /// Returns `true` if the request is admitted, consuming one token.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.config.burst,
            last_refill: now,
        });

        bucket.refill(self.config.rate, self.config.burst, now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub type SharedRateLimiter = Arc<RateLimiter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_requests_within_burst() {
        let limiter = RateLimiter::new(RateLimiterConfig { rate: 1.0, burst: 3.0 });
        assert!(limiter.check("client-a"));
        assert!(limiter.check("client-a"));
        assert!(limiter.check("client-a"));
    }

    #[test]
    fn rejects_once_burst_is_exhausted() {
        let limiter = RateLimiter::new(RateLimiterConfig { rate: 0.001, burst: 1.0 });
        assert!(limiter.check("client-a"));
        assert!(!limiter.check("client-a"));
    }

    #[test]
    fn buckets_are_independent_per_key() {
        let limiter = RateLimiter::new(RateLimiterConfig { rate: 0.001, burst: 1.0 });
        assert!(limiter.check("client-a"));
        assert!(limiter.check("client-b"));
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(RateLimiterConfig { rate: 1000.0, burst: 1.0 });
        assert!(limiter.check("client-a"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check("client-a"));
    }
}
