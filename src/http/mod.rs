//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (hyper connection, Axum middleware, dispatch)
//!     → routing layer picks the route
//!     → static_files.rs | websocket.rs | proxy.rs
//!          (request.rs prepares forwarded requests,
//!           body.rs bounds stalled bodies)
//!     → response.rs (error → status mapping)
//!     → Send to client
//!
//! Plaintext connection
//!     → redirect.rs (301 to the canonical HTTPS URL)
//! ```

pub mod body;
pub mod proxy;
pub mod redirect;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;
pub mod websocket;

pub use response::ProxyError;
pub use server::{AppState, GatewayServer, X_REQUEST_ID};
