//! Rate limiting implementation using token bucket algorithm.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token bucket rate limiter keyed by client IP.
///
/// A bucket holds up to `max_tokens` and regains all of them over one
/// `window`, so bursts of cursor updates are absorbed while a sustained
/// flood is cut off.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<IpAddr, TokenBucket>>>,
    max_tokens: u32,
    window: Duration,
    blocked_count: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a new rate limiter allowing `max_tokens` requests per `window`
    pub fn new(max_tokens: u32, window: Duration) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            max_tokens: max_tokens.max(1),
            window,
            blocked_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Checks if a request from the given IP should be allowed
    pub async fn check_rate_limit(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        let max = f64::from(self.max_tokens);

        let bucket = buckets.entry(ip).or_insert(TokenBucket {
            tokens: max,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let refill_rate = max / self.window.as_secs_f64().max(f64::EPSILON);
        bucket.tokens = (bucket.tokens + elapsed * refill_rate).min(max);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            self.blocked_count.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Gets the total number of blocked requests
    pub fn blocked_count(&self) -> u64 {
        self.blocked_count.load(Ordering::Relaxed)
    }

    /// Drops buckets that have been idle for longer than `idle`
    pub async fn cleanup_old_entries(&self, idle: Duration) {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn allows_a_burst_up_to_the_limit() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

        for _ in 0..5 {
            assert!(limiter.check_rate_limit(ip).await);
        }
        assert!(!limiter.check_rate_limit(ip).await);
        assert_eq!(limiter.blocked_count(), 1);

        // Other clients have their own bucket.
        assert!(limiter.check_rate_limit(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))).await);
    }

    #[tokio::test]
    async fn tokens_refill_over_the_window() {
        let limiter = RateLimiter::new(2, Duration::from_millis(100));
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

        assert!(limiter.check_rate_limit(ip).await);
        assert!(limiter.check_rate_limit(ip).await);
        assert!(!limiter.check_rate_limit(ip).await);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(limiter.check_rate_limit(ip).await);
    }

    #[tokio::test]
    async fn idle_buckets_are_dropped() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        limiter.check_rate_limit(ip).await;

        limiter.cleanup_old_entries(Duration::ZERO).await;
        assert!(limiter.buckets.read().await.is_empty());
    }
}
