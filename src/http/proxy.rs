//! Reverse proxy forwarding.
//!
//! # Responsibilities
//! - Rewrite the request for the backend (URI, prefix strip, forwarded headers)
//! - Send it through the pooled client with a response-head deadline
//! - Relay status, headers and a streamed body back to the client
//! - Abort either body when it stalls between frames
//!
//! # Design Decisions
//! - Bodies are never buffered: the incoming body is the upstream body and
//!   the backend body is the client body
//! - Outgoing requests are always HTTP/1.1, whatever the client spoke
//! - Dropping the handler future (client gone) drops the backend request

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Extensions, Request, Response, Version};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::TimeoutConfig;
use crate::http::body::IdleTimeoutBody;
use crate::http::request::{backend_uri, original_host, set_forwarded_headers, strip_hop_by_hop};
use crate::http::response::ProxyError;
use crate::routing::Route;

/// Pooled HTTP/1.1 client shared by all routes.
pub type BackendClient = Client<HttpConnector, Body>;

/// Build the backend client. Connections are pooled per backend address and
/// resolved on every new connect.
pub fn build_client(timeouts: &TimeoutConfig) -> BackendClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(90))
        .build(connector)
}

/// Forward a plain (non-upgrade) request to `address`.
///
/// `response_timeout` bounds the wait for the response head; `body_idle`
/// bounds every gap between body frames in both directions.
pub async fn forward(
    client: &BackendClient,
    response_timeout: Duration,
    body_idle: Duration,
    route: &Route,
    address: &str,
    peer: SocketAddr,
    request: Request<Body>,
) -> Result<Response<Body>, ProxyError> {
    let (mut parts, body) = request.into_parts();

    let host = original_host(&parts);
    let path = route.forward_path(parts.uri.path()).into_owned();
    parts.uri = backend_uri(address, &path, parts.uri.query())?;
    parts.version = Version::HTTP_11;
    parts.extensions = Extensions::new();
    strip_hop_by_hop(&mut parts.headers);
    set_forwarded_headers(&mut parts.headers, host, peer);

    tracing::debug!(route = route.name(), backend = address, path = %path, "Forwarding request");

    let body = Body::new(IdleTimeoutBody::new(body_idle, body));
    let response = send(client, response_timeout, Request::from_parts(parts, body)).await?;
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(IdleTimeoutBody::new(body_idle, body))))
}

/// Send `request`, mapping failures to gateway errors.
pub(crate) async fn send(
    client: &BackendClient,
    response_timeout: Duration,
    request: Request<Body>,
) -> Result<Response<Incoming>, ProxyError> {
    match tokio::time::timeout(response_timeout, client.request(request)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) if e.is_connect() => Err(ProxyError::Unreachable(e)),
        Ok(Err(e)) => Err(ProxyError::Upstream(e)),
        Err(_) => Err(ProxyError::Timeout(response_timeout)),
    }
}
