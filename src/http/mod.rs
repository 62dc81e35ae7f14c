//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, upgrade detection, early-data pre-check)
//!     → websocket.rs (split socket, adapt to tunnel session)
//!     → tunnel::run_session
//! ```

pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer, ServerError};
