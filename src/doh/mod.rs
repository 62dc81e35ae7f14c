//! DNS-over-HTTPS subsystem.
//!
//! # Data Flow
//! ```text
//! fallback.rs ── lookup_ipv4(domain) ──→ GET  {url}?name=..&type=A  (application/dns-json)
//! dns.rs      ── exchange(datagram)  ──→ POST {url}                 (application/dns-message)
//! ```
//!
//! # Design Decisions
//! - One endpoint, no failover; every call carries its own deadline
//! - The reqwest client is pooled and cheap to clone into each session

pub mod client;
pub mod types;

pub use client::DohClient;
pub use types::{DohAnswer, DohError, DohJsonResponse, RECORD_TYPE_A};
