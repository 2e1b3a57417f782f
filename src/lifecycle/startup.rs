//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Compile the route table and load the TLS material
//! - Bind both listeners behind one shared connection limit
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is bound on a bad config
//! - Listeners bind last (traffic only when ready)

use std::net::SocketAddr;

use tokio_rustls::TlsAcceptor;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::http::GatewayServer;
use crate::lifecycle::Shutdown;
use crate::net::{load_tls_acceptor, ConnectionLimit, Listener, ListenerError, TlsError};
use crate::routing::{RouteTable, RoutingError};

/// Error type for startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("tls: {0}")]
    Tls(#[from] TlsError),

    #[error("routing: {0}")]
    Routing(#[from] RoutingError),

    #[error("listener: {0}")]
    Listener(#[from] ListenerError),
}

/// Everything derived from the configuration before any socket is bound.
pub struct Prepared {
    pub config: GatewayConfig,
    pub routes: RouteTable,
    pub tls: TlsAcceptor,
}

/// Validate `config`, compile routes and load the certificate.
pub fn prepare(config: GatewayConfig) -> Result<Prepared, StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    let routes = RouteTable::from_config(&config.routes)?;
    let tls = load_tls_acceptor(&config.server.tls)?;

    tracing::info!(
        canonical_host = %config.server.canonical_host,
        routes = routes.routes().len(),
        max_connections = config.server.max_connections,
        "Configuration prepared"
    );

    Ok(Prepared { config, routes, tls })
}

/// Fail-fast startup: validate, load TLS, compile routes, bind listeners.
pub async fn bootstrap(config: GatewayConfig, shutdown: Shutdown) -> Result<Gateway, StartupError> {
    let prepared = prepare(config)?;
    Gateway::bind(prepared, shutdown).await
}

/// A gateway with bound listeners, ready to serve.
pub struct Gateway {
    server: GatewayServer,
    http: Listener,
    https: Listener,
}

impl Gateway {
    /// Bind the configured addresses.
    pub async fn bind(prepared: Prepared, shutdown: Shutdown) -> Result<Self, StartupError> {
        let server = &prepared.config.server;
        let limit = ConnectionLimit::new(server.max_connections);
        let http = Listener::bind(&server.http_address, limit.clone()).await?;
        let https = Listener::bind(&server.https_address, limit).await?;
        Ok(Self::with_listeners(prepared, shutdown, http, https))
    }

    /// Use already bound listeners.
    pub fn with_listeners(prepared: Prepared, shutdown: Shutdown, http: Listener, https: Listener) -> Self {
        let server = GatewayServer::new(&prepared.config, prepared.routes, prepared.tls, shutdown);
        Self { server, http, https }
    }

    pub fn http_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.http.local_addr()
    }

    pub fn https_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.https.local_addr()
    }

    pub fn server(&self) -> &GatewayServer {
        &self.server
    }

    /// Serve until shutdown and drain.
    pub async fn run(self) {
        self.server.run(self.http, self.https).await
    }
}
