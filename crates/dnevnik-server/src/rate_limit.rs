//! Per-IP rate limiting for the public endpoints.
//!
//! The webhook and the challenge endpoints are unauthenticated by nature,
//! so each client IP gets a token bucket: `burst` requests immediately,
//! refilled at `rate` per second. Buckets are evicted after sitting idle.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug)]
struct Bucket {
    available: f64,
    touched: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    rate: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate,
            burst,
        }
    }

    /// Take one token for `ip`, refilling the bucket for the time elapsed
    /// since its last use. Returns whether the request may proceed.
    pub async fn try_acquire(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        let bucket = buckets.entry(ip).or_insert(Bucket {
            available: self.burst,
            touched: now,
        });

        let refill = now.duration_since(bucket.touched).as_secs_f64() * self.rate;
        bucket.available = (bucket.available + refill).min(self.burst);
        bucket.touched = now;

        if bucket.available < 1.0 {
            return false;
        }
        bucket.available -= 1.0;
        true
    }

    /// Drop buckets idle for longer than `max_idle_secs`.
    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        buckets.retain(|_, b| now.duration_since(b.touched).as_secs_f64() < max_idle_secs);
    }
}

impl Default for RateLimiter {
    /// 5 req/s sustained, burst of 20.
    fn default() -> Self {
        Self::new(5.0, 20.0)
    }
}

pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ip) = client_ip(&req) {
        if !limiter.try_acquire(ip).await {
            warn!(ip = %ip, "rate limit exceeded");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    Ok(next.run(req).await)
}

/// Peer address from ConnectInfo, or the first X-Forwarded-For hop when
/// running behind a reverse proxy.
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Some(ip) = forwarded
            .to_str()
            .ok()
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
        {
            return Some(ip);
        }
    }

    req.extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_is_limited() {
        let limiter = RateLimiter::new(1.0, 3.0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.try_acquire(ip).await);
        }
        assert!(!limiter.try_acquire(ip).await);
    }

    #[tokio::test]
    async fn ips_are_independent() {
        let limiter = RateLimiter::new(1.0, 1.0);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.try_acquire(a).await);
        assert!(!limiter.try_acquire(a).await);
        assert!(limiter.try_acquire(b).await);
    }

    #[tokio::test]
    async fn purge_drops_idle_buckets() {
        let limiter = RateLimiter::default();
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        assert!(limiter.try_acquire(ip).await);

        limiter.purge_stale(0.0).await;
        assert!(limiter.buckets.lock().await.is_empty());
    }
}
