//! Best-effort datagram socket.
//!
//! Sends are fire-and-forget: a single attempt, no retry, no ordering.

use std::io;
use std::marker::PhantomData;
use std::net::{SocketAddr, UdpSocket};

use tracing::debug;

use super::service::TransportService;
use super::socket;
use crate::core::{NetworkStack, TransportError, TransportResult};

/// A non-blocking UDP socket sized from the service budget.
#[derive(Debug)]
pub struct DatagramSocket<'s> {
    socket: Option<UdpSocket>,
    _service: PhantomData<&'s ()>,
}

impl<'s> DatagramSocket<'s> {
    /// Open a socket on an ephemeral port of the wildcard address.
    pub fn open<S: NetworkStack>(service: &'s TransportService<'_, S>) -> TransportResult<Self> {
        Self::bind(service, socket::wildcard(0))
    }

    /// Open a socket bound to `addr`.
    pub fn bind<S: NetworkStack>(
        service: &'s TransportService<'_, S>,
        addr: SocketAddr,
    ) -> TransportResult<Self> {
        service.ensure_ready()?;
        let socket = socket::datagram_socket(service.config(), addr)?;
        Ok(Self {
            socket: Some(UdpSocket::from(socket)),
            _service: PhantomData,
        })
    }

    /// Send `buf` as one datagram.
    ///
    /// Succeeds only if the whole buffer went out in a single call; a
    /// partial send is [`TransportError::ShortWrite`]. Would-block is a
    /// failure like any other.
    pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> TransportResult<()> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        let sent = socket.send_to(buf, addr)?;
        if sent != buf.len() {
            debug!(sent, expected = buf.len(), %addr, "short datagram");
            return Err(TransportError::ShortWrite {
                sent,
                expected: buf.len(),
            });
        }
        Ok(())
    }

    /// Receive one pending datagram, if any.
    pub fn try_recv_from(&self, buf: &mut [u8]) -> TransportResult<Option<(usize, SocketAddr)>> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        match socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The bound local address.
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        Ok(socket.local_addr()?)
    }

    /// Whether the socket is still open.
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Release the socket. No-op if already closed.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("datagram socket closed");
        }
    }
}
