//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! `GatewayConfig::default()` reproduces the stock deployment topology.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener, virtual host and limits.
    pub server: ServerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Ordered route table. Longest prefix wins, declaration order breaks ties.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            timeouts: TimeoutConfig::default(),
            routes: default_routes(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener and virtual host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The single authoritative domain name for encrypted traffic.
    pub canonical_host: String,

    /// Plaintext bind address (redirect only).
    pub http_address: String,

    /// Encrypted bind address.
    pub https_address: String,

    /// HTTPS port advertised in redirects. Omitted from `Location` when 443.
    pub public_https_port: u16,

    /// Certificate and key for the canonical host.
    pub tls: TlsConfig,

    /// Maximum in-flight connections across both listeners (backpressure).
    pub max_connections: usize,

    /// Maximum client request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            canonical_host: "localhost".to_string(),
            http_address: "0.0.0.0:80".to_string(),
            https_address: "0.0.0.0:443".to_string(),
            public_https_port: 443,
            tls: TlsConfig::default(),
            max_connections: 1024,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// TLS configuration for the encrypted listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: "/etc/edge-gateway/tls/fullchain.pem".to_string(),
            key_path: "/etc/edge-gateway/tls/privkey.pem".to_string(),
        }
    }
}

/// Route rule mapping a path prefix to a backend or a static directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Literal, case-sensitive path prefix.
    pub prefix: String,

    /// Backend address (`host:port`, plain HTTP).
    #[serde(default)]
    pub backend: Option<String>,

    /// Directory served read-only for this prefix.
    #[serde(default)]
    pub static_root: Option<String>,

    /// Remove the matched prefix before forwarding.
    #[serde(default)]
    pub strip_prefix: bool,

    /// Allow WebSocket upgrades on this route.
    #[serde(default)]
    pub allow_upgrade: bool,

    /// Response headers added to every response of this route.
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl RouteConfig {
    /// Route forwarding to a backend.
    pub fn backend(prefix: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            backend: Some(address.into()),
            static_root: None,
            strip_prefix: false,
            allow_upgrade: false,
            extra_headers: BTreeMap::new(),
        }
    }

    /// Route serving a local directory.
    pub fn static_dir(prefix: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            backend: None,
            static_root: Some(root.into()),
            strip_prefix: true,
            allow_upgrade: false,
            extra_headers: BTreeMap::new(),
        }
    }

    pub fn with_strip_prefix(mut self) -> Self {
        self.strip_prefix = true;
        self
    }

    pub fn with_upgrade(mut self) -> Self {
        self.allow_upgrade = true;
        self
    }
}

/// Routes of the stock deployment.
fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::backend("/novnc/", "127.0.0.1:7900").with_upgrade(),
        RouteConfig::backend("/websockify", "127.0.0.1:7900").with_upgrade(),
        RouteConfig::static_dir("/static-data/", "/srv/static-data"),
        RouteConfig::backend("/bg3/", "127.0.0.1:8001").with_strip_prefix(),
        RouteConfig::backend("/", "127.0.0.1:8000"),
    ]
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TLS handshake deadline in seconds.
    pub handshake_secs: u64,

    /// Per-connection deadline for reading HTTP/1 request headers, in seconds.
    pub header_read_secs: u64,

    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for the backend response head in seconds.
    pub response_secs: u64,

    /// Longest gap between two body frames, in either direction, before a
    /// relayed body is aborted.
    pub body_idle_secs: u64,

    /// Per-connection idle limit: a client connection with no request in
    /// flight for this long is shut down gracefully.
    pub connection_idle_secs: u64,

    /// HTTP/2 keep-alive ping interval; an unanswered ping closes the connection.
    pub keep_alive_secs: u64,

    /// Idle limit of an upgraded tunnel in seconds.
    pub upgrade_idle_secs: u64,

    /// How long shutdown waits for open connections to drain.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_secs: 10,
            header_read_secs: 30,
            connect_secs: 5,
            response_secs: 60,
            body_idle_secs: 60,
            connection_idle_secs: 75,
            keep_alive_secs: 20,
            upgrade_idle_secs: 3600,
            shutdown_grace_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_routes_cover_deployment() {
        let config = GatewayConfig::default();
        let prefixes: Vec<&str> = config.routes.iter().map(|r| r.prefix.as_str()).collect();
        assert_eq!(prefixes, ["/novnc/", "/websockify", "/static-data/", "/bg3/", "/"]);
        assert!(config.routes[3].strip_prefix);
        assert!(config.routes[1].allow_upgrade);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [server]
            canonical_host = "gateway.example.org"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.canonical_host, "gateway.example.org");
        assert_eq!(config.server.max_connections, 1024);
        assert_eq!(config.routes.len(), 5);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn routes_parse_from_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[routes]]
            prefix = "/bg3/"
            backend = "extract:8001"
            strip_prefix = true

            [[routes]]
            prefix = "/"
            backend = "api:8000"

            [routes.extra_headers]
            "X-Served-By" = "edge"
            "#,
        )
        .unwrap();
        assert_eq!(config.routes.len(), 2);
        assert!(config.routes[0].strip_prefix);
        assert_eq!(config.routes[1].extra_headers.get("X-Served-By").unwrap(), "edge");
    }

    #[test]
    fn partial_timeouts_keep_other_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [timeouts]
            body_idle_secs = 5
            connection_idle_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.timeouts.body_idle_secs, 5);
        assert_eq!(config.timeouts.connection_idle_secs, 30);
        assert_eq!(config.timeouts.keep_alive_secs, 20);
        assert_eq!(config.timeouts.response_secs, 60);
    }
}
