//! Edge tunnel library.
//!
//! Tunnels a VLESS-style binary proxy protocol over WebSocket, relaying each
//! channel to the TCP destination named in its header, with a NAT64
//! fallback over DNS-over-HTTPS and DNS-only UDP.

pub mod config;
pub mod doh;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod tunnel;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
