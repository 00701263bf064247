//! Security module for input validation, rate limiting, and per-IP limits.

use crate::config::SecurityConfig;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub mod input_validation;
pub mod rate_limiter;

/// Central security manager for the world server
#[derive(Debug)]
pub struct SecurityManager {
    config: SecurityConfig,
    rate_limiter: rate_limiter::RateLimiter,
    connection_tracker: Arc<RwLock<HashMap<IpAddr, u32>>>,
}

impl SecurityManager {
    /// Creates a new security manager with the given configuration
    pub fn new(config: SecurityConfig) -> Self {
        let rate_limiter =
            rate_limiter::RateLimiter::new(config.max_messages_per_second, Duration::from_secs(1));

        Self {
            config,
            rate_limiter,
            connection_tracker: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validates an incoming connection attempt and counts it against the IP
    pub async fn validate_connection(&self, ip: IpAddr) -> Result<(), SecurityError> {
        if self.config.banned_ips.contains(&ip) {
            return Err(SecurityError::BannedIp(ip));
        }

        let mut tracker = self.connection_tracker.write().await;
        let count = tracker.entry(ip).or_insert(0);
        if *count >= self.config.max_connections_per_ip {
            return Err(SecurityError::TooManyConnections(ip));
        }
        *count += 1;

        Ok(())
    }

    /// Validates an incoming message
    pub async fn validate_message(&self, ip: IpAddr, message: &[u8]) -> Result<(), SecurityError> {
        if message.len() > self.config.max_message_size {
            return Err(SecurityError::MessageTooLarge(message.len()));
        }

        if self.config.enable_rate_limiting && !self.rate_limiter.check_rate_limit(ip).await {
            return Err(SecurityError::RateLimitExceeded(ip));
        }

        input_validation::validate_json_message(message, &self.config)
    }

    /// Registers a connection disconnect
    pub async fn on_disconnect(&self, ip: IpAddr) {
        let mut tracker = self.connection_tracker.write().await;
        if let Some(count) = tracker.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                tracker.remove(&ip);
            }
        }
    }

    /// Drops rate limit state for clients idle longer than five minutes
    pub async fn cleanup(&self) {
        self.rate_limiter
            .cleanup_old_entries(Duration::from_secs(300))
            .await;
    }

    /// Gets current security statistics
    pub async fn stats(&self) -> SecurityStats {
        SecurityStats {
            tracked_ips: self.connection_tracker.read().await.len(),
            rate_limited_requests: self.rate_limiter.blocked_count(),
            banned_ips: self.config.banned_ips.len(),
        }
    }
}

/// Security-related statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityStats {
    pub tracked_ips: usize,
    pub rate_limited_requests: u64,
    pub banned_ips: usize,
}

/// Security-related errors
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("IP address {0} is banned")]
    BannedIp(IpAddr),

    #[error("Too many connections from IP {0}")]
    TooManyConnections(IpAddr),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Rate limit exceeded for IP {0}")]
    RateLimitExceeded(IpAddr),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Malicious content detected")]
    MaliciousContent,
}

impl SecurityError {
    /// HTTP-style status reported to the client.
    pub fn status_code(&self) -> u16 {
        match self {
            SecurityError::BannedIp(_) => 403,
            SecurityError::TooManyConnections(_) | SecurityError::RateLimitExceeded(_) => 429,
            SecurityError::MessageTooLarge(_) => 413,
            SecurityError::InvalidMessageFormat(_) | SecurityError::MaliciousContent => 400,
        }
    }
}
