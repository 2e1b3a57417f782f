//! TLS-terminating edge gateway.
//!
//! One plaintext listener that redirects to HTTPS, one encrypted listener that
//! routes by path prefix to plain-HTTP backends, upgrade tunnels or a
//! read-only static directory.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::{bootstrap, Gateway, Shutdown};
