//! Outbound half of a channel.
//!
//! The WebSocket implementation lives in `http::websocket`; tests drive
//! sessions through in-memory implementations.

use std::future::Future;
use std::io;

use bytes::Bytes;

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Closure because of an internal failure; carries a reason string.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Write side of a message channel.
pub trait ChannelSink: Send {
    /// Deliver one binary message.
    fn send(&mut self, data: Bytes) -> impl Future<Output = io::Result<()>> + Send;

    /// Close the channel with `code` and a caller-visible `reason`.
    fn close(&mut self, code: u16, reason: &str) -> impl Future<Output = io::Result<()>> + Send;
}
