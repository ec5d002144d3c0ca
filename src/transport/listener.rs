//! Listening socket for the single remote peer.
//!
//! [`Listener::open`] never gives up: creation, bind and listen failures are
//! expected right after boot or a sleep/wake cycle, so they are retried with
//! a fixed minimal backoff until a usable socket exists.
//! [`Listener::accept`] is a zero-timeout `poll(2)` on the socket followed by
//! a non-blocking accept; it never depends on the async reactor having run.

use std::io;
use std::marker::PhantomData;
use std::net::SocketAddr;

use socket2::{SockAddr, Socket};
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::link::{LinkState, WouldBlockHeuristic};
use super::service::TransportService;
use super::socket;
use crate::core::constants::RETRY_INTERVAL;
use crate::core::{LinkMonitor, NetworkStack, TransportError, TransportResult};

/// Failed attempts between two warnings while retrying.
const WARN_EVERY: u64 = 1000;

/// A bound, non-blocking, address-reusing listener with a backlog of one.
#[derive(Debug)]
pub struct Listener<'s, M: LinkMonitor = WouldBlockHeuristic> {
    socket: Option<Socket>,
    monitor: M,
    port: u16,
    _service: PhantomData<&'s ()>,
}

impl<'s> Listener<'s, WouldBlockHeuristic> {
    /// Open a listener on the wildcard address, retrying until it succeeds.
    ///
    /// The only error is [`TransportError::NotReady`] for an uninitialized
    /// service.
    pub async fn open<S: NetworkStack>(
        service: &'s TransportService<'_, S>,
        port: u16,
    ) -> TransportResult<Self> {
        Self::open_with_monitor(service, port, WouldBlockHeuristic).await
    }
}

impl<'s, M: LinkMonitor> Listener<'s, M> {
    /// Like [`open`](Listener::open), with a custom link-state monitor.
    pub async fn open_with_monitor<S: NetworkStack>(
        service: &'s TransportService<'_, S>,
        port: u16,
        monitor: M,
    ) -> TransportResult<Self> {
        service.ensure_ready()?;

        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            match socket::listening_socket(service.config(), port) {
                Ok(socket) => {
                    info!(port, attempts, "listener ready");
                    return Ok(Self {
                        socket: Some(socket),
                        monitor,
                        port,
                        _service: PhantomData,
                    });
                }
                Err(err) => {
                    // The partially opened socket was closed when the
                    // failing step dropped it.
                    if attempts == 1 || attempts % WARN_EVERY == 0 {
                        warn!(port, attempts, step = %err.step, error = %err.source, "listener setup failed, retrying");
                    } else {
                        debug!(port, attempts, step = %err.step, error = %err.source, "listener setup failed, retrying");
                    }
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
            }
        }
    }

    /// Accept a pending connection without waiting.
    ///
    /// - `Ok(None)`: nothing pending, poll again later.
    /// - `Ok(Some(_))`: a non-blocking connection to the peer.
    /// - `Err(LinkDown)`: the poll reported a connection but the accept
    ///   failed in a way the link monitor attributes to the network stack
    ///   (by default: it would block). The listener should be reopened.
    ///
    /// Must be called from within a tokio runtime, which the accepted
    /// connection registers with.
    pub fn accept(&mut self) -> TransportResult<Option<Connection<'s>>> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        let pending = socket::poll_pending(socket)?;
        self.accept_polled(pending, Socket::accept)
    }

    fn accept_polled<F>(
        &mut self,
        pending: bool,
        accept: F,
    ) -> TransportResult<Option<Connection<'s>>>
    where
        F: FnOnce(&Socket) -> io::Result<(Socket, SockAddr)>,
    {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        if !pending {
            return Ok(None);
        }

        match accept(socket) {
            Ok((stream, addr)) => {
                let stream = socket::accepted_stream(stream)?;
                info!(port = self.port, peer = ?addr.as_socket(), "accepted connection");
                Ok(Some(Connection::new(stream)))
            }
            Err(err) => match self.monitor.classify(&err, pending) {
                LinkState::Down => {
                    warn!(port = self.port, error = %err, "accept failed after poll, network stack looks down");
                    Err(TransportError::LinkDown)
                }
                LinkState::Up
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    Ok(None)
                }
                LinkState::Up => {
                    warn!(port = self.port, error = %err, "accept failed");
                    Err(err.into())
                }
            },
        }
    }

    /// The port this listener was opened on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The bound local address.
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        socket
            .local_addr()?
            .as_socket()
            .ok_or_else(|| io::Error::other("listener bound to a non-inet address").into())
    }

    /// Whether the listener still holds its socket.
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Release the socket. No-op if already closed.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!(port = self.port, "listener closed");
        }
    }
}
