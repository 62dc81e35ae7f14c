//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated)
//!     → edge.rs (EdgeConfig, immutable runtime view)
//!     → shared via Arc to every tunnel session
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod edge;
pub mod loader;
pub mod schema;
pub mod validation;

pub use edge::{EdgeConfig, SessionTimeouts};
pub use loader::{load_config, ConfigError};
pub use schema::{DohConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig, TunnelConfig};
pub use validation::ValidationError;
