//! Transport layer for the capture stream.
//!
//! This module moves opaque byte buffers from the device to a single remote
//! client. It provides:
//!
//! - **Memory budget**: [`TransportConfig`] and [`BackingMemory`], sizing the
//!   region handed to the network stack
//! - **Service lifecycle**: [`TransportService`], the context every socket is
//!   created from
//! - **Listening**: [`Listener`] with indefinite open retry and a zero-timeout
//!   [`accept`](Listener::accept)
//! - **Reliable stream**: [`Connection`] with a cancellable
//!   [`send_all`](Connection::send_all)
//! - **Best-effort datagrams**: [`DatagramSocket`]
//! - **Link state**: [`LinkState`] and [`WouldBlockHeuristic`], detecting a
//!   suspended network stack
//! - **Cancellation**: [`RunController`] / [`RunSignal`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      Capture workload (frames)          │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   listener, connection, datagrams       │
//! ├─────────────────────────────────────────┤
//! │   Network stack (NetworkStack impl)     │
//! ├─────────────────────────────────────────┤
//! │            TCP / UDP                    │
//! └─────────────────────────────────────────┘
//! ```

mod budget;
mod connection;
mod datagram;
mod link;
mod listener;
mod service;
mod signal;
mod socket;

pub use budget::{
    page_align, BackingMemory, DefaultBackingMemory, PayloadLimits, TransportConfig,
    DEFAULT_BACKING_SIZE,
};
pub use connection::Connection;
pub use datagram::DatagramSocket;
pub use link::{LinkState, WouldBlockHeuristic};
pub use listener::Listener;
pub use service::{HostStack, TransportService};
pub use signal::{run_signal, RunController, RunSignal};

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Small buffers so that a non-reading peer quickly fills them.
    pub(crate) const TEST_CONFIG: TransportConfig = TransportConfig::DEFAULT
        .with_tcp(0x2000, 0x2000)
        .with_tcp_max(0, 0)
        .with_udp(0x2000, 0x2000);
    const TEST_SIZE: usize = TEST_CONFIG.backing_memory_size();

    /// A service that was never initialized.
    pub(crate) fn uninitialized_service() -> TransportService<'static> {
        let memory = Box::leak(Box::new(BackingMemory::<TEST_SIZE>::new()));
        TransportService::host(TEST_CONFIG, memory.as_mut_slice())
    }

    /// An initialized host service with [`TEST_CONFIG`].
    pub(crate) fn service() -> TransportService<'static> {
        let mut service = uninitialized_service();
        service.initialize().unwrap();
        service
    }
}
