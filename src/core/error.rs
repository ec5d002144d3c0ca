//! Error types for the capture transport.
//!
//! None of these errors are meant for end users. They are consumed by the
//! caller's reconnect logic, except [`TransportError::Misconfigured`], which
//! must abort startup.

use std::io;

use thiserror::Error;

/// Static configuration rejected by the network stack.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Efficiency multiplier is zero.
    #[error("socket efficiency multiplier must be non-zero")]
    ZeroEfficiency,

    /// A base buffer size is zero.
    #[error("{0} buffer size must be non-zero")]
    EmptyBuffer(&'static str),

    /// The backing memory size does not fit in `usize`.
    #[error("backing memory size overflows")]
    Overflow,

    /// The supplied region is smaller than the budget.
    #[error("backing memory too small: need {required:#x} bytes, got {actual:#x}")]
    RegionTooSmall {
        /// Bytes required by the configuration.
        required: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// The supplied region does not start on a page boundary.
    #[error("backing memory is not page aligned")]
    RegionMisaligned,
}

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The network stack rejected the static configuration.
    /// Never retried: the process cannot proceed.
    #[error("network stack misconfigured: {0}")]
    Misconfigured(#[from] ConfigError),

    /// The transport service has not been initialized.
    #[error("transport service not initialized")]
    NotReady,

    /// The socket handle has been closed.
    #[error("socket is not connected")]
    NotConnected,

    /// The run signal stopped while waiting for the peer.
    #[error("operation cancelled")]
    Cancelled,

    /// The peer performed an orderly shutdown.
    #[error("connection closed by peer")]
    PeerClosed,

    /// A datagram was only partially accepted by the platform.
    #[error("short write: sent {sent} of {expected} bytes")]
    ShortWrite {
        /// Bytes accepted.
        sent: usize,
        /// Bytes requested.
        expected: usize,
    },

    /// The network stack itself (not just one socket) is unavailable,
    /// typically after a sleep/wake cycle.
    #[error("network link down")]
    LinkDown,
}

impl TransportError {
    /// Check if this error must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Misconfigured(_))
    }

    /// Check if the link-state heuristic reported the network stack as down.
    ///
    /// Callers should drop and reopen their listener.
    pub fn is_link_down(&self) -> bool {
        matches!(self, TransportError::LinkDown)
    }

    /// Check if the connection is unusable and should be torn down.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_)
                | TransportError::NotConnected
                | TransportError::PeerClosed
                | TransportError::LinkDown
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
