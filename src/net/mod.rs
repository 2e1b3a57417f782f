//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, shared connection limit)
//!     → tls.rs (TLS handshake on the encrypted listener)
//!     → connection.rs (lifecycle tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - TLS material is validated once at startup

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{
    ConnectionActivity, ConnectionGuard, ConnectionId, ConnectionSlot, ConnectionTracker, RequestActivity,
};
pub use listener::{ConnectionLimit, ConnectionPermit, Listener, ListenerError};
pub use tls::{load_tls_acceptor, TlsError};
