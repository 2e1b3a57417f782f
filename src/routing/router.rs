//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the single matching route for a request path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Total: the catch-all guarantees every path resolves to a route

use std::path::PathBuf;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::RouteConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// Where a matched request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Plain HTTP backend, addressed as `host:port`.
    Backend { address: String },
    /// Read-only directory.
    Static { root: PathBuf },
}

/// A compiled route rule.
#[derive(Debug, Clone)]
pub struct Route {
    matcher: PathPrefixMatcher,
    pub target: Target,
    pub strip_prefix: bool,
    pub allow_upgrade: bool,
    /// Response headers added to every response of this route.
    pub extra_headers: HeaderMap,
}

impl Route {
    /// Route identifier for logging/metrics.
    pub fn name(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Path to forward for `path`, honouring `strip_prefix`.
    pub fn forward_path<'a>(&self, path: &'a str) -> std::borrow::Cow<'a, str> {
        if self.strip_prefix {
            self.matcher.strip(path)
        } else {
            std::borrow::Cow::Borrowed(path)
        }
    }

    /// Path below the route prefix, always rooted at `/`.
    pub fn relative_path<'a>(&self, path: &'a str) -> std::borrow::Cow<'a, str> {
        self.matcher.strip(path)
    }
}

/// Error compiling a route table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("route table has no catch-all \"/\" route")]
    MissingCatchAll,

    #[error("route {0:?} must set exactly one of `backend` or `static_root`")]
    AmbiguousTarget(String),

    #[error("route {prefix:?}: invalid extra header {name:?}")]
    InvalidHeader { prefix: String, name: String },
}

/// Immutable, ordered route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Sorted most-specific first; equal lengths keep declaration order.
    routes: Vec<Route>,
    catch_all: usize,
}

impl RouteTable {
    /// Compile route configs into a table.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, RoutingError> {
        let mut routes = Vec::with_capacity(configs.len());
        for config in configs {
            routes.push(compile_route(config)?);
        }

        // Stable sort keeps declaration order for equally specific prefixes.
        routes.sort_by(|a, b| b.matcher.specificity().cmp(&a.matcher.specificity()));

        let catch_all = routes
            .iter()
            .position(|r| r.matcher.is_catch_all())
            .ok_or(RoutingError::MissingCatchAll)?;

        tracing::debug!(
            routes = ?routes.iter().map(Route::name).collect::<Vec<_>>(),
            "Route table compiled"
        );

        Ok(Self { routes, catch_all })
    }

    /// Select the route whose prefix is the longest match for `path`.
    pub fn match_path(&self, path: &str) -> &Route {
        self.routes
            .iter()
            .find(|r| r.matcher.matches(path))
            .unwrap_or(&self.routes[self.catch_all])
    }

    /// Routes in evaluation order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

fn compile_route(config: &RouteConfig) -> Result<Route, RoutingError> {
    let target = match (&config.backend, &config.static_root) {
        (Some(address), None) => Target::Backend {
            address: address.clone(),
        },
        (None, Some(root)) => Target::Static {
            root: PathBuf::from(root),
        },
        _ => return Err(RoutingError::AmbiguousTarget(config.prefix.clone())),
    };

    let mut extra_headers = HeaderMap::new();
    for (name, value) in &config.extra_headers {
        let invalid = || RoutingError::InvalidHeader {
            prefix: config.prefix.clone(),
            name: name.clone(),
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        extra_headers.insert(name, value);
    }

    Ok(Route {
        matcher: PathPrefixMatcher::new(config.prefix.clone()),
        target,
        strip_prefix: config.strip_prefix,
        allow_upgrade: config.allow_upgrade,
        extra_headers,
    })
}
