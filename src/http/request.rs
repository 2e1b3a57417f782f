//! Request preparation for forwarding.
//!
//! # Responsibilities
//! - Extract the originally requested host (HTTP/1 `Host` or HTTP/2 `:authority`)
//! - Strip hop-by-hop headers
//! - Inject client identity headers (`X-Real-IP`, `X-Forwarded-For`, `X-Forwarded-Proto`)
//! - Detect WebSocket upgrade requests
//! - Build the backend URI

use std::net::SocketAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::Uri;

use crate::http::response::ProxyError;

pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Headers that only apply to a single transport hop.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn has_token(headers: &HeaderMap, name: HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// True for `Connection: upgrade` + `Upgrade: websocket`.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    has_token(headers, header::CONNECTION, "upgrade") && has_token(headers, header::UPGRADE, "websocket")
}

/// The host the client asked for.
pub fn original_host(parts: &Parts) -> Option<HeaderValue> {
    parts.headers.get(header::HOST).cloned().or_else(|| {
        parts
            .uri
            .authority()
            .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
    })
}

/// Set `Host`, `X-Real-IP`, `X-Forwarded-For` and `X-Forwarded-Proto`.
pub fn set_forwarded_headers(headers: &mut HeaderMap, host: Option<HeaderValue>, peer: SocketAddr) {
    let client_ip = peer.ip().to_string();

    if let Some(host) = host {
        headers.insert(header::HOST, host);
    }

    let chain: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    let forwarded_for = if chain.is_empty() {
        client_ip.clone()
    } else {
        format!("{}, {}", chain.join(", "), client_ip)
    };

    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Ok(value) = HeaderValue::from_str(&client_ip) {
        headers.insert(X_REAL_IP, value);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
}

/// `http://<address><path>[?query]`.
pub fn backend_uri(address: &str, path: &str, query: Option<&str>) -> Result<Uri, ProxyError> {
    let uri = match query {
        Some(q) => format!("http://{}{}?{}", address, path, q),
        None => format!("http://{}{}", address, path),
    };
    Ok(uri.parse()?)
}
