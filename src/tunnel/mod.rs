//! Tunnel core.
//!
//! # Data Flow
//! ```text
//! WebSocket ──→ stream.rs (early data + channel messages → chunks)
//!           ──→ session.rs (first chunk → protocol::decode_header)
//!                 ├── relay.rs ──→ connector.rs ──→ destination
//!                 │      └── fallback.rs (DoH A lookup → NAT64 → one retry)
//!                 └── dns.rs ──→ DoH POST per datagram
//! responses ──→ writer.rs (one-time header, single writer) ──→ channel.rs
//! ```
//!
//! # Design Decisions
//! - One task per channel; nothing shared but the immutable `EdgeConfig`
//! - The outbound socket and the channel sink each have exactly one owner
//! - Every suspension point has a deadline

pub mod channel;
pub mod connector;
pub mod dns;
pub mod error;
pub mod fallback;
pub mod relay;
pub mod session;
pub mod stream;
pub mod writer;

pub use channel::{ChannelSink, CLOSE_INTERNAL_ERROR, CLOSE_NORMAL};
pub use connector::{Dialer, OutboundHandle, TcpDialer};
pub use error::TunnelError;
pub use session::{run_session, SessionEnd, TunnelContext};
pub use stream::{decode_early_data, ChunkStream};
pub use writer::ResponseWriter;
