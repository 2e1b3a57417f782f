//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Compile routes → Load TLS → Bind listeners
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Close idle connections → Cancel tunnels → Drain
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then TLS, then listeners
//! - Shutdown has a deadline: connections still open after the grace period are dropped

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::shutdown_on_signal;
pub use startup::{bootstrap, prepare, Gateway, Prepared, StartupError};
