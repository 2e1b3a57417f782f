//! HTTP server setup and connection handling.
//!
//! # Responsibilities
//! - Build the Axum applications for both listeners
//! - Wire up middleware (security headers, request ID, tracing, body limit)
//! - Run the accept loops: TLS handshake, HTTP/1.1 or HTTP/2, upgrades
//! - Close connections that stay idle or stop answering HTTP/2 pings
//! - Dispatch requests to the matched route
//! - Drain connections on shutdown
//!
//! # Data Flow
//! ```text
//! :80  → Listener → hyper (HTTP/1.1) → redirect router → 301
//! :443 → Listener → TLS handshake → hyper (h2 | HTTP/1.1)
//!      → security headers → request ID → trace → body limit
//!      → dispatch → static | upgrade tunnel | reverse proxy
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderName, HeaderValue, Request, Response};
use axum::response::IntoResponse;
use axum::Router;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::http::proxy::{self, BackendClient};
use crate::http::redirect::redirect_router;
use crate::http::request::is_websocket_upgrade;
use crate::http::websocket::{self, TunnelOptions};
use crate::http::static_files;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionActivity, ConnectionSlot, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::{RouteTable, Target};
use crate::security::{with_body_limit, with_security_headers};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub client: BackendClient,
    pub response_timeout: Duration,
    pub body_idle: Duration,
    pub upgrade_idle: Duration,
    pub shutdown: Shutdown,
}

/// UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Per-connection protocol limits.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    header_read_timeout: Duration,
    keep_alive: Duration,
    idle_timeout: Duration,
}

/// The gateway: redirect listener plus TLS listener.
pub struct GatewayServer {
    app: Router,
    redirect: Router,
    tls: TlsAcceptor,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
    handshake_timeout: Duration,
    connection: ConnectionOptions,
    shutdown_grace: Duration,
}

impl GatewayServer {
    /// Create a new server. `routes` and `tls` must come from the same config.
    pub fn new(config: &GatewayConfig, routes: RouteTable, tls: TlsAcceptor, shutdown: Shutdown) -> Self {
        let timeouts = &config.timeouts;
        let state = AppState {
            routes: Arc::new(routes),
            client: proxy::build_client(timeouts),
            response_timeout: Duration::from_secs(timeouts.response_secs),
            body_idle: Duration::from_secs(timeouts.body_idle_secs),
            upgrade_idle: Duration::from_secs(timeouts.upgrade_idle_secs),
            shutdown: shutdown.clone(),
        };

        Self {
            app: Self::build_router(config, state),
            redirect: redirect_router(&config.server.canonical_host, config.server.public_https_port),
            tls,
            tracker: ConnectionTracker::new(),
            shutdown,
            handshake_timeout: Duration::from_secs(timeouts.handshake_secs),
            connection: ConnectionOptions {
                header_read_timeout: Duration::from_secs(timeouts.header_read_secs),
                keep_alive: Duration::from_secs(timeouts.keep_alive_secs),
                idle_timeout: Duration::from_secs(timeouts.connection_idle_secs),
            },
            shutdown_grace: Duration::from_secs(timeouts.shutdown_grace_secs),
        }
    }

    /// Build the HTTPS application with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let router = Router::new().fallback(dispatch).with_state(state);
        let router = with_body_limit(router, config.server.max_body_size)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4));
        with_security_headers(router)
    }

    /// The HTTPS application, without the transport.
    pub fn https_router(&self) -> Router {
        self.app.clone()
    }

    /// The plaintext redirect application.
    pub fn redirect_router(&self) -> Router {
        self.redirect.clone()
    }

    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Serve both listeners until shutdown, then drain open connections.
    pub async fn run(self, http: Listener, https: Listener) {
        tracing::info!(
            http = ?http.local_addr().ok(),
            https = ?https.local_addr().ok(),
            "Gateway serving"
        );

        tokio::join!(self.accept_loop(&http, false), self.accept_loop(&https, true));

        tracing::info!(
            active = self.tracker.active_count(),
            grace = ?self.shutdown_grace,
            "Listeners closed, draining connections"
        );
        if self.tracker.wait_for_drain(self.shutdown_grace).await {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain deadline reached, closing remaining connections"
            );
        }
    }

    async fn accept_loop(&self, listener: &Listener, secure: bool) {
        let token = self.shutdown.token();
        loop {
            let accepted = tokio::select! {
                _ = token.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer, permit) = match accepted {
                Ok(connection) => connection,
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            let slot = ConnectionSlot::new(permit, self.tracker.track());
            let token = self.shutdown.token();
            let options = self.connection;

            if secure {
                let app = self.app.clone();
                let acceptor = self.tls.clone();
                let handshake_timeout = self.handshake_timeout;
                tokio::spawn(async move {
                    let tls_stream = match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
                        Ok(Ok(tls_stream)) => tls_stream,
                        Ok(Err(e)) => {
                            metrics::record_handshake_failure();
                            tracing::debug!(peer = %peer, error = %e, "TLS handshake failed");
                            return;
                        }
                        Err(_) => {
                            metrics::record_handshake_failure();
                            tracing::debug!(peer = %peer, "TLS handshake timed out");
                            return;
                        }
                    };
                    serve_connection(tls_stream, app, peer, slot, options, token).await;
                });
            } else {
                let app = self.redirect.clone();
                tokio::spawn(serve_connection(stream, app, peer, slot, options, token));
            }
        }
    }
}

/// Serve HTTP on one established connection until it closes, or until
/// shutdown or the idle limit asks it to finish its in-flight requests.
async fn serve_connection<I>(
    io: I,
    app: Router,
    peer: SocketAddr,
    slot: ConnectionSlot,
    options: ConnectionOptions,
    token: CancellationToken,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let connection_id = slot.id();
    let activity = Arc::new(ConnectionActivity::new());
    let service = {
        let activity = Arc::clone(&activity);
        service_fn(move |mut request: Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(peer));
            request.extensions_mut().insert(slot.clone());
            let in_flight = activity.begin();
            let response = app.clone().oneshot(request);
            async move {
                let response = response.await;
                drop(in_flight);
                response
            }
        })
    };

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(options.header_read_timeout);
    builder
        .http2()
        .timer(TokioTimer::new())
        .keep_alive_interval(options.keep_alive)
        .keep_alive_timeout(options.keep_alive);

    let connection = builder.serve_connection_with_upgrades(TokioIo::new(io), service);
    tokio::pin!(connection);

    // Graceful shutdown lets in-flight requests and streamed bodies finish.
    let mut closing = false;
    let result = loop {
        tokio::select! {
            result = connection.as_mut() => break result,
            _ = token.cancelled(), if !closing => {
                closing = true;
                connection.as_mut().graceful_shutdown();
            }
            _ = activity.idle(options.idle_timeout), if !closing => {
                tracing::debug!(connection_id = %connection_id, peer = %peer, "Closing idle connection");
                closing = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    };
    if let Err(e) = result {
        tracing::debug!(connection_id = %connection_id, peer = %peer, error = %e, "Connection closed with error");
    }
}

/// Route a request on the encrypted listener.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    let start = Instant::now();
    let routes = Arc::clone(&state.routes);
    let route = routes.match_path(request.uri().path());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let result = match &route.target {
        Target::Static { root } => static_files::serve(root, route, request).await,
        Target::Backend { address } if route.allow_upgrade && is_websocket_upgrade(request.headers()) => {
            let tunnel = TunnelOptions {
                idle_timeout: state.upgrade_idle,
                token: state.shutdown.child_token(),
            };
            websocket::proxy_upgrade(&state.client, state.response_timeout, tunnel, route, address, peer, request)
                .await
        }
        Target::Backend { address } => {
            proxy::forward(
                &state.client,
                state.response_timeout,
                state.body_idle,
                route,
                address,
                peer,
                request,
            )
            .await
        }
    };

    let mut response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                route = route.name(),
                method = %method,
                path = %path,
                status = e.status().as_u16(),
                error = %e,
                "Request failed"
            );
            e.into_response()
        }
    };

    for (name, value) in &route.extra_headers {
        response.headers_mut().insert(name.clone(), value.clone());
    }

    metrics::record_request(route.name(), response.status().as_u16(), start);
    response
}
