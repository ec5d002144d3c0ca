//! Core traits for the capture transport.
//!
//! These traits are the seams where a platform plugs in: the network stack
//! that owns the backing memory, and the probe that decides whether the
//! stack itself has gone away.

use std::io;

use super::error::ConfigError;
use crate::transport::{LinkState, TransportConfig};

/// A platform network stack that runs out of a caller-supplied memory region.
///
/// Implements the start/stop half of the transport service lifecycle.
/// [`TransportService`](crate::transport::TransportService) guarantees that
/// `start` and `stop` strictly alternate, starting with `start`.
///
/// # Example
///
/// ```ignore
/// struct Recorder { started: bool }
///
/// impl NetworkStack for Recorder {
///     fn start(&mut self, config: &TransportConfig, memory: &mut [u8]) -> Result<(), ConfigError> {
///         config.validate()?;
///         self.started = true;
///         Ok(())
///     }
///
///     fn stop(&mut self) {
///         self.started = false;
///     }
/// }
/// ```
pub trait NetworkStack {
    /// Hand the configuration and the zeroed backing region to the stack.
    ///
    /// A rejection indicates a static misconfiguration and is never retried.
    fn start(&mut self, config: &TransportConfig, memory: &mut [u8]) -> Result<(), ConfigError>;

    /// Release the stack.
    fn stop(&mut self);
}

/// Decides whether an accept failure means the network stack is unavailable.
///
/// Platforms without a direct "stack suspended" notification rely on a
/// heuristic; platforms with one can replace it without touching the listener.
pub trait LinkMonitor {
    /// Classify an accept error.
    ///
    /// `after_readiness` is `true` when the readiness poll had just reported
    /// a pending connection.
    fn classify(&self, err: &io::Error, after_readiness: bool) -> LinkState;
}
