//! # Middleware Module
//!
//! Request admission and conditional caching for the ringfact HTTP API.
//!
//! ## Rate limiting
//!
//! One GCRA limiter per method class (read = GET/HEAD/OPTIONS, write =
//! everything else), keyed by client. The client is the first
//! `X-Forwarded-For` hop, else the peer address, else `anonymous`. Every
//! limited response carries `x-ratelimit-limit`, `x-ratelimit-remaining` and
//! `x-ratelimit-reset`; a refusal is a 429 with `retry-after`.
//!
//! ## ETags
//!
//! Cacheable GET routes get a weak ETag over path, sorted query parameters
//! and `Accept`. A matching `If-None-Match` short-circuits to an empty 304.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::StateInformationMiddleware,
    state::keyed::DefaultKeyedStateStore,
};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use super::error::ApiError;
use crate::config::ServerConfig;

/// Limiter state is pruned once this many clients are tracked.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Length of a quota window.
const WINDOW_SECS: u64 = 60;

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Per-client limiter reporting remaining capacity on success.
pub type KeyedRateLimiter = RateLimiter<
    String,
    DefaultKeyedStateStore<String>,
    DefaultClock,
    StateInformationMiddleware,
>;

/// Create a keyed limiter admitting `per_minute` requests per client.
///
/// Returns `None` when `per_minute` is 0 (limiting disabled).
pub fn create_rate_limiter(per_minute: u32) -> Option<Arc<KeyedRateLimiter>> {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute)?);
    Some(Arc::new(
        RateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>(),
    ))
}

/// Read and write limiters.
#[derive(Clone)]
pub struct RateLimits {
    read: Option<Arc<KeyedRateLimiter>>,
    read_limit: u32,
    write: Option<Arc<KeyedRateLimiter>>,
    write_limit: u32,
}

impl RateLimits {
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            read: create_rate_limiter(config.rate_limit_read),
            read_limit: config.rate_limit_read,
            write: create_rate_limiter(config.rate_limit_write),
            write_limit: config.rate_limit_write,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.read.is_some() || self.write.is_some()
    }
}

/// Read or write, for quota purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    Read,
    Write,
}

impl MethodClass {
    #[must_use]
    pub fn of(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
            Self::Read
        } else {
            Self::Write
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Identify the client a request counts against.
#[must_use]
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "anonymous".to_string())
}

fn set_rate_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_secs: u64) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_secs));
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(limits): State<RateLimits>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let class = MethodClass::of(request.method());
    let (limiter, limit) = match class {
        MethodClass::Read => (&limits.read, limits.read_limit),
        MethodClass::Write => (&limits.write, limits.write_limit),
    };
    let Some(limiter) = limiter else {
        return next.run(request).await;
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client = client_key(request.headers(), peer);

    if limiter.len() > MAX_TRACKED_CLIENTS {
        limiter.retain_recent();
    }

    match limiter.check_key(&client) {
        Ok(snapshot) => {
            let remaining = snapshot.remaining_burst_capacity();
            let used = u64::from(limit.saturating_sub(remaining));
            let reset = (used * WINDOW_SECS).div_ceil(u64::from(limit.max(1)));
            let mut response = next.run(request).await;
            set_rate_headers(response.headers_mut(), limit, remaining, reset);
            response
        }
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after_secs = (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1);
            tracing::warn!(
                event = "rate_limited",
                client = %client,
                class = class.name(),
                retry_after_secs,
                "Rate limit exceeded"
            );
            let mut response = ApiError::RateLimited { retry_after_secs }.into_response();
            set_rate_headers(response.headers_mut(), limit, 0, retry_after_secs);
            response
        }
    }
}

// =============================================================================
// CONDITIONAL CACHE
// =============================================================================

/// Weak ETag over path, sorted query parameters and `Accept`.
#[must_use]
pub fn compute_etag(path: &str, query: Option<&str>, accept: Option<&str>) -> String {
    let mut params: Vec<&str> = query
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty())
        .collect();
    params.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    hasher.update(path.as_bytes());
    hasher.update(b"?");
    hasher.update(params.join("&").as_bytes());
    if let Some(accept) = accept {
        hasher.update(b"#");
        hasher.update(accept.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    format!("W/\"{}\"", &hex.as_str()[..32])
}

/// Weak comparison of an `If-None-Match` header against `etag`.
#[must_use]
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let opaque = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let wanted = opaque(etag);
    if_none_match
        .split(',')
        .any(|candidate| candidate.trim() == "*" || opaque(candidate) == wanted)
}

/// ETag middleware for deterministic GET routes.
///
/// The handler always runs; only a 200 becomes a 304, so a request that
/// would fail validation keeps its error whatever `If-None-Match` says.
pub async fn etag_middleware(request: Request<Body>, next: Next) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }
    let etag = compute_etag(
        request.uri().path(),
        request.uri().query(),
        request
            .headers()
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok()),
    );
    let Ok(etag_value) = HeaderValue::from_str(&etag) else {
        return next.run(request).await;
    };
    let if_none_match = request
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }
    if if_none_match.is_some_and(|inm| etag_matches(&inm, &etag)) {
        response = StatusCode::NOT_MODIFIED.into_response();
    }
    let headers = response.headers_mut();
    headers.insert(header::ETAG, etag_value);
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=300"),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Accept"));
    response
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rate_limiter() {
        let limiter = create_rate_limiter(2).expect("enabled");
        let key = "10.0.0.1".to_string();
        let first = limiter.check_key(&key).expect("first admitted");
        assert_eq!(first.remaining_burst_capacity(), 1);
        assert!(limiter.check_key(&key).is_ok());
        assert!(limiter.check_key(&key).is_err());
        // Another client has its own budget
        assert!(limiter.check_key(&"10.0.0.2".to_string()).is_ok());
    }

    #[test]
    fn test_create_rate_limiter_zero_disables() {
        assert!(create_rate_limiter(0).is_none());
    }

    #[test]
    fn method_classes() {
        assert_eq!(MethodClass::of(&Method::GET), MethodClass::Read);
        assert_eq!(MethodClass::of(&Method::OPTIONS), MethodClass::Read);
        assert_eq!(MethodClass::of(&Method::POST), MethodClass::Write);
        assert_eq!(MethodClass::of(&Method::DELETE), MethodClass::Write);
    }

    #[test]
    fn client_key_precedence() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.9:4000".parse().expect("addr");
        assert_eq!(client_key(&headers, None), "anonymous");
        assert_eq!(client_key(&headers, Some(peer)), "192.168.1.9");
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.5 , 10.0.0.1"),
        );
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.5");
    }

    #[test]
    fn etag_ignores_parameter_order() {
        let a = compute_etag("/kernel/op", Some("op=add&x=1&y=2"), None);
        let b = compute_etag("/kernel/op", Some("y=2&x=1&op=add"), None);
        let c = compute_etag("/kernel/op", Some("op=add&x=1&y=3"), None);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("W/\""));
        assert_eq!(a.len(), 32 + 4);
    }

    #[test]
    fn etag_varies_by_accept() {
        assert_ne!(
            compute_etag("/graph", None, Some("application/n-quads")),
            compute_etag("/graph", None, None)
        );
    }

    #[test]
    fn etag_matching() {
        let tag = compute_etag("/x", None, None);
        assert!(etag_matches(&tag, &tag));
        assert!(etag_matches(tag.trim_start_matches("W/"), &tag));
        assert!(etag_matches(&format!("\"other\", {}", tag), &tag));
        assert!(etag_matches("*", &tag));
        assert!(!etag_matches("\"other\"", &tag));
    }
}
