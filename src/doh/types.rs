//! Resolver response types and error definitions.

use serde::Deserialize;
use thiserror::Error;

/// Record type number of an IPv4 address record.
pub const RECORD_TYPE_A: u16 = 1;

/// Errors from the DNS-over-HTTPS endpoint.
#[derive(Debug, Error)]
pub enum DohError {
    #[error("resolver request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("resolver returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("resolver request timed out")]
    Timeout,

    #[error("malformed resolver answer: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no A record for {0}")]
    NoAnswer(String),
}

/// JSON answer of a `application/dns-json` lookup.
///
/// Only the fields the fallback needs are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DohJsonResponse {
    #[serde(rename = "Status", default)]
    pub status: u32,

    #[serde(rename = "Answer", default)]
    pub answer: Vec<DohAnswer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DohAnswer {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub record_type: u16,

    pub data: String,
}

impl DohJsonResponse {
    /// First answer of type A whose data parses as an IPv4 address.
    pub fn first_ipv4(&self) -> Option<std::net::Ipv4Addr> {
        self.answer
            .iter()
            .filter(|record| record.record_type == RECORD_TYPE_A)
            .find_map(|record| record.data.parse().ok())
    }
}
