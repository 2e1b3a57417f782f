//! Request size limits.
//!
//! Bodies larger than `server.max_body_size` are refused with
//! `413 Payload Too Large`. A declared `Content-Length` is checked before
//! anything is forwarded; streamed bodies are cut off once they exceed the
//! limit.

use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Wrap `router` with the body size limit.
pub fn with_body_limit(router: Router, max_body_size: usize) -> Router {
    router.layer(RequestBodyLimitLayer::new(max_body_size))
}
