//! CORS configuration for the registration API.
//!
//! The checkout endpoint is called from the event site's browser pages, so
//! the configured application origin must be allowed alongside localhost
//! (for local development). Everything else is rejected.
//!
//! # Security Policy
//!
//! - **Allowed Origins**: the configured app origin, plus `localhost` /
//!   `127.0.0.1` on any port
//! - **Allowed Methods**: GET, POST, OPTIONS (preflight)
//! - **Allowed Headers**: Content-Type, Stripe-Signature
//! - **Max Age**: 3600 seconds for preflight caching

use std::time::Duration;

use http::{header::HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Headers browsers are allowed to send on cross-origin requests.
pub const ALLOWED_HEADERS: [http::header::HeaderName; 2] = [
    http::header::CONTENT_TYPE,
    http::header::HeaderName::from_static("stripe-signature"),
];

/// Methods allowed on cross-origin requests.
pub const ALLOWED_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];

/// Preflight cache lifetime (1 hour).
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// Creates the CORS layer for the public API.
///
/// `app_origin` is the scheme-and-host of the site embedding the checkout
/// form, typically derived from the configured base URL. Localhost origins
/// are always accepted so local development works without extra setup.
pub fn cors_layer(app_origin: Option<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin_allowed(origin, app_origin.as_deref())
        }))
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(ALLOWED_HEADERS)
        .max_age(Duration::from_secs(DEFAULT_MAX_AGE_SECS))
}

/// Checks whether a request origin may call the API.
pub fn origin_allowed(origin: &HeaderValue, app_origin: Option<&str>) -> bool {
    let origin_str = match origin.to_str() {
        Ok(s) => s,
        Err(_) => return false,
    };

    if let Some(allowed) = app_origin {
        if origin_str.eq_ignore_ascii_case(allowed.trim_end_matches('/')) {
            return true;
        }
    }

    is_localhost_origin(origin_str)
}

/// Checks if the given origin string is a localhost origin.
///
/// Accepts `http(s)://localhost` and `http(s)://127.0.0.1`, with or without
/// a port. Rejects lookalikes such as `http://localhost.evil.com`.
pub fn is_localhost_origin(origin: &str) -> bool {
    let lower = origin.to_lowercase();
    let rest = if let Some(r) = lower.strip_prefix("http://") {
        r
    } else if let Some(r) = lower.strip_prefix("https://") {
        r
    } else {
        return false;
    };

    for host in ["localhost", "127.0.0.1"] {
        if let Some(after) = rest.strip_prefix(host) {
            if after.is_empty() || after.starts_with('/') {
                return true;
            }
            if let Some(port) = after.strip_prefix(':') {
                let port = port.split('/').next().unwrap_or("");
                return matches!(port.parse::<u16>(), Ok(p) if p > 0);
            }
            // "localhostevil.com" and friends fall through here
            return false;
        }
    }

    false
}
