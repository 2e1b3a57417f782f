//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (reject oversized bodies)
//!     → dispatch
//! Outgoing response:
//!     → headers.rs (HSTS, frame and sniffing policy)
//! ```

pub mod headers;
pub mod limits;

pub use headers::with_security_headers;
pub use limits::with_body_limit;
