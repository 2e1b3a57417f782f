//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate prefix conditions)
//!     → Return: the single matched Route
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile matchers and header maps
//!     → Sort by prefix length (stable)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Longest prefix wins, declaration order breaks ties

pub mod matcher;
pub mod router;

pub use router::{Route, RouteTable, RoutingError, Target};
