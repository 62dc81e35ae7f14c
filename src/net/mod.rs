//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming upgrade
//!     → connection.rs (session ID, live-session accounting)
//!     → Hand off to tunnel session
//!
//! Session States:
//!     Upgrading → Active → Closed
//! ```
//!
//! # Design Decisions
//! - Each session tracked for limits and graceful shutdown
//! - Accounting is RAII: a dropped guard always releases its slot

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
