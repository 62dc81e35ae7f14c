//! Session error taxonomy.

use std::io;

use thiserror::Error;

use crate::doh::DohError;
use crate::protocol::DecodeError;

/// Anything that ends a session abnormally.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The first chunk did not decode; nothing was dialed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("dial {target} failed: {source}")]
    DialFailed {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("resolution failed: {0}")]
    Resolution(#[source] DohError),

    #[error("dns exchange failed: {0}")]
    Exchange(#[source] DohError),

    #[error("dns answer of {0} bytes does not fit a frame")]
    OversizedDatagram(usize),

    #[error("relay error: {0}")]
    Relay(#[source] io::Error),

    #[error("channel error: {0}")]
    Channel(#[source] io::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

impl TunnelError {
    /// Error class used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            TunnelError::Decode(_) => "decode",
            TunnelError::DialFailed { .. } => "dial",
            TunnelError::Resolution(_) => "resolution",
            TunnelError::Exchange(_) | TunnelError::OversizedDatagram(_) => "dns",
            TunnelError::Relay(_) => "relay",
            TunnelError::Channel(_) => "channel",
            TunnelError::Timeout(_) => "timeout",
        }
    }
}
