//! # capture-net
//!
//! Transport layer for streaming captured audio/video from a constrained
//! device to a single remote client.
//!
//! It provides:
//!
//! - **Budget**: a deterministic, page-aligned backing-memory size for the
//!   network stack, derived from per-class buffer sizes
//! - **Lifecycle**: a transport service that starts and stops the stack once
//! - **Resilience**: listeners that retry until they succeed, and detection of
//!   a network stack suspended across sleep/wake
//! - **Delivery**: a cancellable send-everything primitive on a reliable
//!   stream, non-blocking receive, and best-effort datagrams
//!
//! Framing, payload formats and capture scheduling are out of scope: buffers
//! are opaque bytes.
//!
//! ## Modules
//!
//! - [`core`]: Constants, traits and error types
//! - [`transport`]: Service, listener, connection and datagram socket
//!
//! ## Example Usage
//!
//! ```no_run
//! use capture_net::prelude::*;
//!
//! # async fn serve() -> TransportResult<()> {
//! let mut memory = Box::new(DefaultBackingMemory::new());
//! let mut service = TransportService::host(TransportConfig::DEFAULT, memory.as_mut_slice());
//! service.initialize()?;
//!
//! let (_controller, running) = run_signal();
//! let mut listener = Listener::open(&service, 9911).await?;
//! loop {
//!     if let Some(mut conn) = listener.accept()? {
//!         conn.send_all(b"frame bytes", &running).await?;
//!         break;
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(1)).await;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Sockets borrow the service, so it cannot be shut down while any of them
//! is alive. Listeners and connections need a tokio runtime and a Unix
//! target.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::transport::{
        run_signal, BackingMemory, Connection, DatagramSocket, DefaultBackingMemory, HostStack,
        LinkState, Listener, PayloadLimits, RunController, RunSignal, TransportConfig,
        TransportService, WouldBlockHeuristic,
    };
}

// Re-export commonly used items at crate root
pub use core::{ConfigError, TransportError, TransportResult};

pub use transport::{
    Connection, DatagramSocket, Listener, RunSignal, TransportConfig, TransportService,
};
