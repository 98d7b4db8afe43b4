use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::rate_limit::{IpRateLimiter, RateLimitResult};
use crate::state::AppState;

/// Client address of the current request, resolved by [`extract_ip`] with
/// the server's `TRUST_PROXY` setting.
///
/// Falls back to `"unknown"` when `ConnectInfo` is unavailable (e.g. in tests
/// that use `Router::oneshot` without `into_make_service_with_connect_info`).
pub struct ClientIp(pub String);

impl axum::extract::FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());
        Ok(Self(extract_ip(
            &parts.headers,
            state.trust_proxy,
            peer.as_deref(),
        )))
    }
}

/// Count one request from `ip`; `RateLimited` once the window is used up.
pub fn check_ip_limit(limiter: &IpRateLimiter, ip: &str) -> Result<RateLimitResult, AppError> {
    let rl = limiter.check_and_increment(ip.to_string());
    if !rl.allowed {
        tracing::debug!(ip, "request rate limited");
        return Err(AppError::rate_limited(&rl));
    }
    Ok(rl)
}

/// Extract the client IP address from request headers and/or peer address.
///
/// When `trust_proxy` is true, uses the first entry in the `X-Forwarded-For`
/// header. Falls back to `peer_ip` (the TCP socket address) when the header is
/// absent, or to `"unknown"` when no peer address is available.
///
/// Only enable `trust_proxy` behind a reverse proxy that overwrites
/// `X-Forwarded-For`; clients can set the header to anything.
pub fn extract_ip(headers: &HeaderMap, trust_proxy: bool, peer_ip: Option<&str>) -> String {
    if trust_proxy
        && let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
    {
        return ip;
    }
    peer_ip.map_or_else(|| "unknown".to_string(), ToString::to_string)
}

/// Build `X-RateLimit-*` response headers from a [`RateLimitResult`].
#[allow(clippy::unwrap_used, clippy::missing_panics_doc)]
pub fn rate_limit_headers(result: &RateLimitResult) -> HeaderMap {
    let mut headers = HeaderMap::new();
    // Parsing numeric strings into HeaderValues never fails.
    headers.insert(
        "x-ratelimit-limit",
        result.limit.to_string().parse().unwrap(),
    );
    headers.insert(
        "x-ratelimit-remaining",
        result.remaining.to_string().parse().unwrap(),
    );
    headers.insert(
        "x-ratelimit-reset",
        result.reset_after_secs.to_string().parse().unwrap(),
    );
    headers
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── extract_ip ──────────────────────────────────────────────────────

    #[test]
    fn extract_ip_from_forwarded_for_single_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.50".parse().unwrap());
        assert_eq!(extract_ip(&headers, true, None), "203.0.113.50");
    }

    #[test]
    fn extract_ip_from_forwarded_for_multiple_ips() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.50, 70.41.3.18, 150.172.238.178".parse().unwrap(),
        );
        assert_eq!(extract_ip(&headers, true, None), "203.0.113.50");
    }

    #[test]
    fn extract_ip_trims_whitespace() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "  10.0.0.1 , 10.0.0.2".parse().unwrap());
        assert_eq!(extract_ip(&headers, true, None), "10.0.0.1");
    }

    #[test]
    fn extract_ip_returns_peer_when_header_missing() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract_ip(&headers, true, Some("192.168.1.1")),
            "192.168.1.1"
        );
    }

    #[test]
    fn extract_ip_returns_unknown_when_no_header_and_no_peer() {
        let headers = HeaderMap::new();
        assert_eq!(extract_ip(&headers, true, None), "unknown");
    }

    #[test]
    fn extract_ip_uses_peer_when_trust_proxy_false() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.50".parse().unwrap());
        assert_eq!(extract_ip(&headers, false, Some("10.0.0.99")), "10.0.0.99");
    }

    #[test]
    fn extract_ip_returns_unknown_when_trust_proxy_false_and_no_peer() {
        let headers = HeaderMap::new();
        assert_eq!(extract_ip(&headers, false, None), "unknown");
    }

    // ── check_ip_limit ──────────────────────────────────────────────────

    #[test]
    fn check_ip_limit_denies_after_budget() {
        let limiter = IpRateLimiter::per_minute(2);
        assert_eq!(check_ip_limit(&limiter, "10.0.0.1").unwrap().remaining, 1);
        assert!(check_ip_limit(&limiter, "10.0.0.1").is_ok());
        let err = check_ip_limit(&limiter, "10.0.0.1").unwrap_err();
        assert!(matches!(err, AppError::RateLimited { limit: 2, remaining: 0, .. }));
        assert!(check_ip_limit(&limiter, "10.0.0.2").is_ok());
    }

    // ── rate_limit_headers ──────────────────────────────────────────────

    #[test]
    fn rate_limit_headers_contains_correct_values() {
        let result = RateLimitResult {
            allowed: true,
            limit: 60,
            remaining: 42,
            reset_after_secs: 30,
        };
        let headers = rate_limit_headers(&result);
        assert_eq!(headers["x-ratelimit-limit"], "60");
        assert_eq!(headers["x-ratelimit-remaining"], "42");
        assert_eq!(headers["x-ratelimit-reset"], "30");
    }

    #[test]
    fn rate_limit_headers_zero_remaining() {
        let result = RateLimitResult {
            allowed: false,
            limit: 10,
            remaining: 0,
            reset_after_secs: 3600,
        };
        let headers = rate_limit_headers(&result);
        assert_eq!(headers["x-ratelimit-limit"], "10");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["x-ratelimit-reset"], "3600");
    }
}
