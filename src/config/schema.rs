//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tunnel.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Identity accepted when no configuration overrides it.
pub const DEFAULT_UUID: &str = "86c50e3a-5b87-49dd-bd20-03c7f2735e40";

/// Well-known NAT64 prefix used to reach IPv4 destinations from IPv6-only egress.
pub const DEFAULT_NAT64_PREFIX: &str = "2001:67c:2960:6464::";

/// Public DNS-over-HTTPS endpoint serving both JSON lookups and binary messages.
pub const DEFAULT_DOH_URL: &str = "https://1.1.1.1/dns-query";

/// Root configuration for the tunnel.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Tunnel identity and address translation.
    pub tunnel: TunnelConfig,

    /// DNS-over-HTTPS resolver.
    pub doh: DohConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent tunnel sessions (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Tunnel protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// The only requester identity accepted in request headers.
    pub uuid: String,

    /// IPv6 prefix (a /96) into which resolved IPv4 addresses are embedded.
    pub nat64_prefix: String,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            uuid: DEFAULT_UUID.to_string(),
            nat64_prefix: DEFAULT_NAT64_PREFIX.to_string(),
        }
    }
}

/// DNS-over-HTTPS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DohConfig {
    /// Resolver endpoint. Used for `?name=..&type=A` JSON lookups and
    /// `application/dns-message` POST exchanges alike.
    pub url: String,
}

impl Default for DohConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DOH_URL.to_string(),
        }
    }
}

/// Timeout configuration for every suspension point of a session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Outbound TCP connect timeout in seconds.
    pub connect_secs: u64,

    /// DNS-over-HTTPS request timeout in seconds.
    pub resolve_secs: u64,

    /// Relay idle timeout in seconds.
    pub idle_secs: u64,

    /// How long a fresh channel may stay silent before its header arrives.
    pub first_chunk_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            resolve_secs: 5,
            idle_secs: 300,
            first_chunk_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
