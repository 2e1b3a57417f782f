//! WebSocket upgrade proxying.
//!
//! # Responsibilities
//! - Forward the upgrade handshake to the backend
//! - Answer the client with the backend's `101 Switching Protocols`
//! - Relay raw bytes in both directions until either side closes
//!
//! # Data Flow
//! ```text
//! Client ←──── bytes ────→ Gateway ←──── bytes ────→ Backend
//!          pump (c→b) ─┐             ┌─ pump (b→c)
//!                      └─ CancellationToken ─┘ ← idle watchdog / shutdown
//! ```
//!
//! # Design Decisions
//! - Frames are not parsed: the tunnel is byte-transparent
//! - Both pumps and the idle watchdog share one token; the first to finish
//!   cancels the others, so no half-open connection outlives its peer
//! - Any failure before the client's 101 is answered with 502

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::http::{Extensions, Request, Response, StatusCode, Version};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::http::proxy::{send, BackendClient};
use crate::http::request::{backend_uri, original_host, set_forwarded_headers, strip_hop_by_hop};
use crate::http::response::ProxyError;
use crate::net::ConnectionSlot;
use crate::observability::metrics;
use crate::routing::Route;

const PUMP_BUFFER: usize = 16 * 1024;

/// Settings for one upgraded tunnel.
#[derive(Debug, Clone)]
pub struct TunnelOptions {
    /// Close the tunnel after this long without traffic in either direction.
    pub idle_timeout: Duration,
    /// Cancelled on gateway shutdown.
    pub token: CancellationToken,
}

/// Bytes relayed by a finished tunnel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TunnelStats {
    pub client_to_backend: u64,
    pub backend_to_client: u64,
}

/// Proxy a WebSocket upgrade request to `address`.
pub async fn proxy_upgrade(
    client: &BackendClient,
    response_timeout: Duration,
    tunnel: TunnelOptions,
    route: &Route,
    address: &str,
    peer: SocketAddr,
    mut request: Request<Body>,
) -> Result<Response<Body>, ProxyError> {
    let client_upgrade = request
        .extensions_mut()
        .remove::<OnUpgrade>()
        .ok_or(ProxyError::UpgradeUnavailable)?;
    let slot = request.extensions().get::<ConnectionSlot>().cloned();

    let (mut parts, body) = request.into_parts();
    let protocol = parts
        .headers
        .get(header::UPGRADE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("websocket"));

    let host = original_host(&parts);
    let path = route.forward_path(parts.uri.path()).into_owned();
    parts.uri = backend_uri(address, &path, parts.uri.query())?;
    parts.version = Version::HTTP_11;
    parts.extensions = Extensions::new();
    strip_hop_by_hop(&mut parts.headers);
    parts.headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    parts.headers.insert(header::UPGRADE, protocol);
    set_forwarded_headers(&mut parts.headers, host, peer);

    let mut response = send(client, response_timeout, Request::from_parts(parts, body)).await?;
    if response.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::warn!(
            route = route.name(),
            backend = address,
            status = %response.status(),
            "Backend refused upgrade"
        );
        return Err(ProxyError::UpgradeRefused(response.status()));
    }

    let backend_upgrade = hyper::upgrade::on(&mut response);
    let backend_io = match tokio::time::timeout(response_timeout, backend_upgrade).await {
        Ok(Ok(upgraded)) => upgraded,
        Ok(Err(e)) => return Err(ProxyError::UpgradeFailed(e)),
        Err(_) => return Err(ProxyError::Timeout(response_timeout)),
    };

    let route_name = route.name().to_string();
    let backend = address.to_string();
    tokio::spawn(async move {
        // Holds the connection slot for the tunnel's lifetime.
        let _slot = slot;
        match client_upgrade.await {
            Ok(client_io) => {
                tracing::info!(route = %route_name, backend = %backend, peer = %peer, "Upgrade tunnel opened");
                let stats = run_tunnel(TokioIo::new(client_io), TokioIo::new(backend_io), tunnel).await;
                tracing::info!(
                    route = %route_name,
                    peer = %peer,
                    client_to_backend = stats.client_to_backend,
                    backend_to_client = stats.backend_to_client,
                    "Upgrade tunnel closed"
                );
            }
            Err(e) => {
                tracing::warn!(route = %route_name, error = %e, "Client upgrade failed");
            }
        }
    });

    let (parts, _) = response.into_parts();
    Ok(Response::from_parts(parts, Body::empty()))
}

/// Relay bytes between `client` and `backend` until one side closes, the
/// tunnel idles out, or `options.token` is cancelled.
pub async fn run_tunnel<C, B>(client: C, backend: B, options: TunnelOptions) -> TunnelStats
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let token = options.token.child_token();
    let started = Instant::now();
    let last_activity = Arc::new(AtomicU64::new(0));

    let (client_read, client_write) = tokio::io::split(client);
    let (backend_read, backend_write) = tokio::io::split(backend);

    metrics::tunnel_opened();
    let upstream = tokio::spawn(pump(
        client_read,
        backend_write,
        token.clone(),
        started,
        last_activity.clone(),
    ));
    let downstream = tokio::spawn(pump(
        backend_read,
        client_write,
        token.clone(),
        started,
        last_activity.clone(),
    ));
    let watchdog = tokio::spawn(idle_watchdog(
        options.idle_timeout,
        token.clone(),
        started,
        last_activity,
    ));

    let (up, down) = tokio::join!(upstream, downstream);
    token.cancel();
    let _ = watchdog.await;
    metrics::tunnel_closed();

    TunnelStats {
        client_to_backend: up.unwrap_or_default(),
        backend_to_client: down.unwrap_or_default(),
    }
}

/// Copy one direction. Cancels the shared token when it stops for any reason.
async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    token: CancellationToken,
    started: Instant,
    last_activity: Arc<AtomicU64>,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER];
    let mut total = 0u64;

    loop {
        let n = tokio::select! {
            _ = token.cancelled() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(error = %e, "Tunnel read failed");
                    break;
                }
            },
        };

        let written = tokio::select! {
            _ = token.cancelled() => break,
            written = writer.write_all(&buf[..n]) => written,
        };
        if let Err(e) = written {
            tracing::debug!(error = %e, "Tunnel write failed");
            break;
        }

        total += n as u64;
        last_activity.store(started.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    token.cancel();
    let _ = writer.shutdown().await;
    total
}

/// Cancel `token` once no byte has moved for `idle`.
async fn idle_watchdog(
    idle: Duration,
    token: CancellationToken,
    started: Instant,
    last_activity: Arc<AtomicU64>,
) {
    loop {
        let last = Duration::from_millis(last_activity.load(Ordering::Relaxed));
        let deadline = started + last + idle;
        if Instant::now() >= deadline {
            tracing::debug!(idle = ?idle, "Tunnel idle timeout");
            token.cancel();
            return;
        }
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep_until(deadline.into()) => {}
        }
    }
}
