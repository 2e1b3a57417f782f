//! Security response headers.
//!
//! Every response of the encrypted listener carries:
//! - `Strict-Transport-Security: max-age=31536000; includeSubDomains`
//! - `X-Frame-Options: DENY`
//! - `X-Content-Type-Options: nosniff`
//!
//! Values set by a backend are overridden so the policy cannot be weakened
//! from behind the gateway.

use axum::http::header::{self, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

pub const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Wrap `router` so every response gets the security headers.
pub fn with_security_headers(router: Router) -> Router {
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}
