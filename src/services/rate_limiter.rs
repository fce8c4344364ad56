//! Login rate limiting
//!
//! Two sliding windows: failed logins per username (5 per 15 minutes) and
//! login requests per client IP (10 per minute).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

const USERNAME_LIMIT: usize = 5;
const IP_LIMIT: usize = 10;

/// Timestamps per key inside a fixed-length trailing window
struct Window<K> {
    hits: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
    span: Duration,
    limit: usize,
}

impl<K: Eq + Hash> Window<K> {
    fn new(span: Duration, limit: usize) -> Self {
        Self {
            hits: RwLock::new(HashMap::new()),
            span,
            limit,
        }
    }

    async fn is_limited(&self, key: &K) -> bool {
        let cutoff = Utc::now() - self.span;
        let mut hits = self.hits.write().await;
        match hits.get_mut(key) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.limit
            }
            None => false,
        }
    }

    async fn record(&self, key: K) {
        self.hits.write().await.entry(key).or_default().push(Utc::now());
    }

    async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    /// Drops stale timestamps and empty keys; returns keys left.
    async fn cleanup(&self) -> usize {
        let cutoff = Utc::now() - self.span;
        let mut hits = self.hits.write().await;
        hits.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
        hits.len()
    }
}

/// Login rate limiter
pub struct LoginRateLimiter {
    usernames: Window<String>,
    ips: Window<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(
            Duration::minutes(15),
            USERNAME_LIMIT,
            Duration::minutes(1),
            IP_LIMIT,
        )
    }

    pub fn with_limits(
        username_window: Duration,
        username_limit: usize,
        ip_window: Duration,
        ip_limit: usize,
    ) -> Self {
        Self {
            usernames: Window::new(username_window, username_limit),
            ips: Window::new(ip_window, ip_limit),
        }
    }

    /// Usernames are compared case-insensitively
    pub async fn is_username_limited(&self, username: &str) -> bool {
        self.usernames.is_limited(&username.to_lowercase()).await
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        self.usernames.record(username.to_lowercase()).await;
    }

    /// Forget failed attempts after a successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        self.usernames.clear(&username.to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ips.is_limited(&ip).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ips.record(ip).await;
    }

    /// Remove expired entries
    pub async fn cleanup(&self) {
        let usernames = self.usernames.cleanup().await;
        let ips = self.ips.cleanup().await;
        tracing::trace!(usernames, ips, "Rate limiter cleaned up");
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_username_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_username_limited("testuser").await);
            limiter.record_failed_attempt("testuser").await;
        }
        limiter.record_failed_attempt("testuser").await;
        assert!(limiter.is_username_limited("testuser").await);

        limiter.clear_username_attempts("testuser").await;
        assert!(!limiter.is_username_limited("testuser").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();

        for _ in 0..9 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        limiter.record_ip_request(ip).await;
        assert!(limiter.is_ip_limited(ip).await);

        let other = IpAddr::from_str("10.0.0.1").unwrap();
        assert!(!limiter.is_ip_limited(other).await);
    }

    #[tokio::test]
    async fn test_case_insensitive_username() {
        let limiter = LoginRateLimiter::new();

        limiter.record_failed_attempt("TestUser").await;
        limiter.record_failed_attempt("testuser").await;
        limiter.record_failed_attempt("TESTUSER").await;
        assert!(!limiter.is_username_limited("testuser").await);

        limiter.record_failed_attempt("testuser").await;
        limiter.record_failed_attempt("testuser").await;
        assert!(limiter.is_username_limited("TestUser").await);
    }

    #[tokio::test]
    async fn test_window_expires() {
        let limiter = LoginRateLimiter::with_limits(
            Duration::milliseconds(30),
            1,
            Duration::milliseconds(30),
            1,
        );
        limiter.record_failed_attempt("jake").await;
        assert!(limiter.is_username_limited("jake").await);

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert!(!limiter.is_username_limited("jake").await);

        limiter.cleanup().await;
        assert!(limiter.usernames.hits.read().await.is_empty());
    }
}
