//! Core constants, traits and error types (always included).

pub mod constants;
mod error;
mod traits;

pub use error::{ConfigError, TransportError, TransportResult};
pub use traits::{LinkMonitor, NetworkStack};
