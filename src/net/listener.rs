//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to configured address(es)
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via a semaphore shared by all listeners
//! - Graceful handling of accept errors

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
    /// The connection limit was closed (shutdown).
    #[error("Connection limit closed")]
    Closed,
}

/// Maximum number of in-flight connections, shared across listeners.
#[derive(Debug, Clone)]
pub struct ConnectionLimit {
    semaphore: Arc<Semaphore>,
    max: usize,
}

impl ConnectionLimit {
    pub fn new(max: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Get current available connection slots.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max(&self) -> usize {
        self.max
    }

    async fn acquire(&self) -> Result<ConnectionPermit, ListenerError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;
        Ok(ConnectionPermit { _permit: permit })
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// When the limit is reached, new connections wait in the kernel backlog
/// until a slot becomes available.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Shared semaphore limiting concurrent connections.
    limit: ConnectionLimit,
}

impl Listener {
    /// Bind to `address` with the given connection limit.
    pub async fn bind(address: &str, limit: ConnectionLimit) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            address: address.to_string(),
            source,
        };
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| bind_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        Ok(Self::from_tcp(listener, limit))
    }

    /// Wrap an already bound listener.
    pub fn from_tcp(inner: TcpListener, limit: ConnectionLimit) -> Self {
        if let Ok(local_addr) = inner.local_addr() {
            tracing::info!(
                address = %local_addr,
                max_connections = limit.max(),
                "Listener bound"
            );
        }
        Self { inner, limit }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// The connection is taken off the backlog first and then waits for a
    /// slot; until one frees up no further connection is accepted. An idle
    /// listener never holds a slot, so listeners sharing a limit cannot
    /// starve each other.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        let _ = stream.set_nodelay(true);

        // Backpressure
        let permit = self.limit.acquire().await?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.limit.available(),
            "Connection accepted"
        );

        Ok((stream, addr, permit))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// Backpressure holds even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
