//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, addresses parse)
//! - Check the route table is total (catch-all present) and unambiguous
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use axum::http::uri::Authority;
use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::{GatewayConfig, RouteConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.canonical_host must not be empty")]
    EmptyCanonicalHost,

    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("route {prefix:?}: prefix must start with '/'")]
    InvalidPrefix { prefix: String },

    #[error("route {prefix:?}: declared more than once")]
    DuplicatePrefix { prefix: String },

    #[error("route table has no catch-all \"/\" route")]
    MissingCatchAll,

    #[error("route {prefix:?}: exactly one of `backend` or `static_root` must be set")]
    AmbiguousTarget { prefix: String },

    #[error("route {prefix:?}: backend {address:?} is not a host:port pair")]
    InvalidBackend { prefix: String, address: String },

    #[error("route {prefix:?}: static_root {root:?} is not a directory")]
    InvalidStaticRoot { prefix: String, root: String },

    #[error("route {prefix:?}: upgrades are only supported on backend routes")]
    UpgradeOnStatic { prefix: String },

    #[error("route {prefix:?}: invalid extra header {name:?}")]
    InvalidHeader { prefix: String, name: String },
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let server = &config.server;
    if server.canonical_host.trim().is_empty() {
        errors.push(ValidationError::EmptyCanonicalHost);
    }
    check_socket_addr(&mut errors, "server.http_address", &server.http_address);
    check_socket_addr(&mut errors, "server.https_address", &server.https_address);
    check_nonzero(&mut errors, "server.public_https_port", server.public_https_port as u64);
    check_nonzero(&mut errors, "server.max_connections", server.max_connections as u64);
    check_nonzero(&mut errors, "server.max_body_size", server.max_body_size as u64);

    let timeouts = &config.timeouts;
    check_nonzero(&mut errors, "timeouts.handshake_secs", timeouts.handshake_secs);
    check_nonzero(&mut errors, "timeouts.header_read_secs", timeouts.header_read_secs);
    check_nonzero(&mut errors, "timeouts.connect_secs", timeouts.connect_secs);
    check_nonzero(&mut errors, "timeouts.response_secs", timeouts.response_secs);
    check_nonzero(&mut errors, "timeouts.body_idle_secs", timeouts.body_idle_secs);
    check_nonzero(&mut errors, "timeouts.connection_idle_secs", timeouts.connection_idle_secs);
    check_nonzero(&mut errors, "timeouts.keep_alive_secs", timeouts.keep_alive_secs);
    check_nonzero(&mut errors, "timeouts.upgrade_idle_secs", timeouts.upgrade_idle_secs);

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if !seen.insert(route.prefix.as_str()) {
            errors.push(ValidationError::DuplicatePrefix {
                prefix: route.prefix.clone(),
            });
        }
        validate_route(&mut errors, route);
    }
    if !seen.contains("/") {
        errors.push(ValidationError::MissingCatchAll);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(errors: &mut Vec<ValidationError>, route: &RouteConfig) {
    let prefix = &route.prefix;
    if !prefix.starts_with('/') {
        errors.push(ValidationError::InvalidPrefix {
            prefix: prefix.clone(),
        });
    }

    match (&route.backend, &route.static_root) {
        (Some(address), None) => {
            let valid = Authority::from_str(address)
                .map(|a| a.port_u16().is_some() && !a.host().is_empty())
                .unwrap_or(false);
            if !valid || address.contains('@') {
                errors.push(ValidationError::InvalidBackend {
                    prefix: prefix.clone(),
                    address: address.clone(),
                });
            }
        }
        (None, Some(root)) => {
            if !Path::new(root).is_dir() {
                errors.push(ValidationError::InvalidStaticRoot {
                    prefix: prefix.clone(),
                    root: root.clone(),
                });
            }
            if route.allow_upgrade {
                errors.push(ValidationError::UpgradeOnStatic {
                    prefix: prefix.clone(),
                });
            }
        }
        _ => errors.push(ValidationError::AmbiguousTarget {
            prefix: prefix.clone(),
        }),
    }

    for (name, value) in &route.extra_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeader {
                prefix: prefix.clone(),
                name: name.clone(),
            });
        }
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_nonzero(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}
