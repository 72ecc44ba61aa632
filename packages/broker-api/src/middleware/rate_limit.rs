// ABOUTME: Per-IP, per-category rate limiting, adapted from packages/cli/src/middleware/rate_limit.rs

use axum::{
    extract::{ConnectInfo, Request},
    http::header::HeaderName,
    middleware::Next,
    response::Response,
};
use broker_core::BrokerError;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroU32,
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};

type RateLimiterType = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;
type RateLimiterInstance = Arc<RateLimiterType>;
type RateLimiterStorage = Arc<Mutex<HashMap<String, RateLimiterInstance>>>;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth_rpm: u32,
    pub sandbox_rpm: u32,
    pub global_rpm: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth_rpm: 10,
            sandbox_rpm: 30,
            global_rpm: 60,
            burst_size: 5,
        }
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    limiters: RateLimiterStorage,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn rpm_for(&self, category: EndpointCategory) -> u32 {
        match category {
            EndpointCategory::Auth => self.config.auth_rpm,
            EndpointCategory::Sandbox => self.config.sandbox_rpm,
            EndpointCategory::Other => self.config.global_rpm,
        }
    }

    fn limiter_for_path(&self, path: &str) -> (RateLimiterInstance, u32) {
        let category = categorize_endpoint(path);
        let rpm = self.rpm_for(category);
        let mut limiters = self.limiters.lock().unwrap();
        let key = format!("{}:{}", category.as_str(), rpm);

        let limiter = limiters
            .entry(key)
            .or_insert_with(|| {
                let quota = Quota::per_minute(NonZeroU32::new(rpm).unwrap_or(NonZeroU32::new(30).unwrap()))
                    .allow_burst(
                        NonZeroU32::new(rpm * self.config.burst_size / 10)
                            .unwrap_or(NonZeroU32::new(5).unwrap()),
                    );
                debug!(category = %category.as_str(), rpm = %rpm, "created rate limiter");
                Arc::new(RateLimiter::direct(quota))
            })
            .clone();
        (limiter, rpm)
    }
}

#[derive(Debug, Clone, Copy)]
enum EndpointCategory {
    Auth,
    Sandbox,
    Other,
}

impl EndpointCategory {
    fn as_str(self) -> &'static str {
        match self {
            EndpointCategory::Auth => "auth",
            EndpointCategory::Sandbox => "sandbox",
            EndpointCategory::Other => "other",
        }
    }
}

fn categorize_endpoint(path: &str) -> EndpointCategory {
    if path.starts_with("/api/register") || path.starts_with("/api/token") {
        EndpointCategory::Auth
    } else if path.contains("/sandboxes") || path.starts_with("/sandbox/") || path.starts_with("/sse") {
        EndpointCategory::Sandbox
    } else {
        EndpointCategory::Other
    }
}

/// Applied via a closure captured in `router::create_router` so every
/// request shares the same limiter map instead of minting a fresh one.
pub async fn rate_limit_middleware(
    layer: RateLimitLayer,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, BrokerError> {
    if !layer.config.enabled {
        return Ok(next.run(request).await);
    }

    let path = request.uri().path().to_string();
    let (limiter, rpm) = layer.limiter_for_path(&path);
    let ip = addr.ip();

    match limiter.check() {
        Ok(_) => {
            let mut response = next.run(request).await;
            if let Ok(limit_value) = axum::http::HeaderValue::from_str(&rpm.to_string()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("x-ratelimit-limit"), limit_value);
            }
            Ok(response)
        }
        Err(_) => {
            warn!(ip = %ip, path = %path, audit = true, "rate limit exceeded");
            Err(BrokerError::conflict("rate limit exceeded"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_auth_and_sandbox_endpoints() {
        assert!(matches!(categorize_endpoint("/api/register"), EndpointCategory::Auth));
        assert!(matches!(categorize_endpoint("/api/token"), EndpointCategory::Auth));
        assert!(matches!(
            categorize_endpoint("/api/users/me/sandboxes"),
            EndpointCategory::Sandbox
        ));
        assert!(matches!(categorize_endpoint("/sse"), EndpointCategory::Sandbox));
        assert!(matches!(categorize_endpoint("/api/users/me"), EndpointCategory::Other));
    }

    #[test]
    fn same_category_reuses_the_same_limiter_instance() {
        let layer = RateLimitLayer::new(RateLimitConfig::default());
        let (a, _) = layer.limiter_for_path("/api/register");
        let (b, _) = layer.limiter_for_path("/api/token");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn limiter_rejects_once_quota_is_exhausted() {
        let quota = Quota::per_minute(NonZeroU32::new(2).unwrap());
        let limiter = RateLimiter::direct(quota);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
