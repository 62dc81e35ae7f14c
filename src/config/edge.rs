//! Runtime view of the validated configuration.
//!
//! `EdgeConfig` is built once before the listener starts and handed to every
//! session behind an `Arc`. Nothing mutates it afterwards.

use std::net::Ipv6Addr;
use std::time::Duration;

use uuid::Uuid;

use crate::config::loader::ConfigError;
use crate::config::schema::{ProxyConfig, TimeoutConfig};
use crate::config::validation::validate_config;

/// Immutable per-process tunnel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeConfig {
    /// Requester identity every header must carry.
    pub identity: [u8; 16],
    /// NAT64 /96 prefix for synthesized fallback addresses.
    pub nat64_prefix: Ipv6Addr,
    /// Deadlines for each suspension point of a session.
    pub timeouts: SessionTimeouts,
}

/// Session deadlines, already converted to `Duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub connect: Duration,
    pub resolve: Duration,
    pub idle: Duration,
    pub first_chunk: Duration,
}

impl From<&TimeoutConfig> for SessionTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_secs(config.connect_secs),
            resolve: Duration::from_secs(config.resolve_secs),
            idle: Duration::from_secs(config.idle_secs),
            first_chunk: Duration::from_secs(config.first_chunk_secs),
        }
    }
}

impl EdgeConfig {
    /// Build the runtime view, validating first.
    pub fn from_proxy_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        // Both parses were checked by validation above.
        let identity = Uuid::parse_str(&config.tunnel.uuid)
            .map(|uuid| *uuid.as_bytes())
            .unwrap_or_default();
        let nat64_prefix = config
            .tunnel
            .nat64_prefix
            .parse()
            .unwrap_or(Ipv6Addr::UNSPECIFIED);

        Ok(Self {
            identity,
            nat64_prefix,
            timeouts: SessionTimeouts::from(&config.timeouts),
        })
    }
}
