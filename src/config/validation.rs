//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate identity, NAT64 prefix and resolver endpoint
//! - Validate value ranges (timeouts > 0, limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{Ipv6Addr, SocketAddr};

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tunnel.uuid is not a valid UUID: {0}")]
    InvalidUuid(String),

    #[error("tunnel.nat64_prefix is not an IPv6 address: {0}")]
    InvalidPrefix(String),

    #[error("tunnel.nat64_prefix must leave the low 32 bits zero: {0}")]
    PrefixTooLong(String),

    #[error("doh.url must be an http(s) URL: {0}")]
    InvalidDohUrl(String),

    #[error("{field} is not a socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if uuid::Uuid::parse_str(&config.tunnel.uuid).is_err() {
        errors.push(ValidationError::InvalidUuid(config.tunnel.uuid.clone()));
    }

    match config.tunnel.nat64_prefix.parse::<Ipv6Addr>() {
        Ok(prefix) => {
            if u128::from(prefix) & 0xffff_ffff != 0 {
                errors.push(ValidationError::PrefixTooLong(config.tunnel.nat64_prefix.clone()));
            }
        }
        Err(_) => errors.push(ValidationError::InvalidPrefix(config.tunnel.nat64_prefix.clone())),
    }

    match url::Url::parse(&config.doh.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
        _ => errors.push(ValidationError::InvalidDohUrl(config.doh.url.clone())),
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }
    let timeouts = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.resolve_secs", config.timeouts.resolve_secs),
        ("timeouts.idle_secs", config.timeouts.idle_secs),
        ("timeouts.first_chunk_secs", config.timeouts.first_chunk_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
