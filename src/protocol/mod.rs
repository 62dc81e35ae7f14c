//! Tunnel wire protocol.
//!
//! # Wire Layout
//! ```text
//! request:  version(1) | identity(16) | addon_len(1) | addon(N) | command(1)
//!           | port(2, BE) | addr_type(1) | address(4 | 1+len | 16) | payload...
//! response: version(1) | 0x00(1) | payload...
//! ```
//!
//! The request header only ever arrives in the first chunk of a channel.

pub mod header;

pub use header::{decode_header, Address, Command, ConnectionRequest, DecodeError, MIN_HEADER_LEN};

/// Build the two-byte response header echoed once per session.
pub fn response_header(version: u8) -> [u8; 2] {
    [version, 0]
}
