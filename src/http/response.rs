//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map gateway failures to HTTP status codes
//! - Keep error bodies fixed (no backend or filesystem details leak)
//!
//! # Design Decisions
//! - Backend unreachable → 502 Bad Gateway
//! - Backend response timeout → 504 Gateway Timeout
//! - Failed upgrade negotiation → 502, never a hung connection
//! - Static path escape → 403, missing file → 404

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy;

/// A request that could not be completed by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("backend unreachable: {0}")]
    Unreachable(#[source] legacy::Error),

    #[error("backend request failed: {0}")]
    Upstream(#[source] legacy::Error),

    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("cannot build backend uri: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),

    #[error("client connection cannot be upgraded")]
    UpgradeUnavailable,

    #[error("backend refused upgrade with status {0}")]
    UpgradeRefused(StatusCode),

    #[error("backend upgrade failed: {0}")]
    UpgradeFailed(#[source] hyper::Error),

    #[error("path escapes static root")]
    Forbidden,

    #[error("file not found")]
    NotFound,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unreachable(_)
            | ProxyError::Upstream(_)
            | ProxyError::UpgradeUnavailable
            | ProxyError::UpgradeRefused(_)
            | ProxyError::UpgradeFailed(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::InvalidUri(_) => StatusCode::BAD_REQUEST,
            ProxyError::Forbidden => StatusCode::FORBIDDEN,
            ProxyError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::BAD_GATEWAY => "Upstream request failed",
            StatusCode::GATEWAY_TIMEOUT => "Upstream request timed out",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::NOT_FOUND => "Not found",
            _ => "Bad request",
        };
        (status, message).into_response()
    }
}
