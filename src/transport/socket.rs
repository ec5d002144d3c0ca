//! Construction of platform sockets sized by the transport budget.
//!
//! `std` and tokio do not expose address reuse, explicit backlogs or buffer
//! sizes before bind, so sockets are built with `socket2` and handed to
//! tokio afterwards.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;

use super::budget::TransportConfig;
use crate::core::constants::LISTEN_BACKLOG;

/// Step of listener creation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Open,
    NonBlocking,
    ReuseAddress,
    Buffers,
    Bind,
    Listen,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Open => "open",
            Step::NonBlocking => "set non-blocking",
            Step::ReuseAddress => "set address reuse",
            Step::Buffers => "size buffers",
            Step::Bind => "bind",
            Step::Listen => "listen",
        };
        f.write_str(name)
    }
}

/// A failed creation step together with its cause.
#[derive(Debug)]
pub(crate) struct StepError {
    pub(crate) step: Step,
    pub(crate) source: io::Error,
}

impl StepError {
    pub(crate) fn at(step: Step) -> impl FnOnce(io::Error) -> Self {
        move |source| Self { step, source }
    }
}

/// Wildcard IPv4 address on `port`.
pub(crate) fn wildcard(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

fn size_buffers(socket: &Socket, tx: usize, rx: usize) -> io::Result<()> {
    socket.set_send_buffer_size(tx)?;
    socket.set_recv_buffer_size(rx)
}

/// Open, configure, bind and listen a reliable-transport socket.
///
/// The returned socket is non-blocking, reuses its address and has a backlog
/// of [`LISTEN_BACKLOG`]. Accepted sockets inherit its buffer sizes.
pub(crate) fn listening_socket(config: &TransportConfig, port: u16) -> Result<Socket, StepError> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(StepError::at(Step::Open))?;
    socket
        .set_nonblocking(true)
        .map_err(StepError::at(Step::NonBlocking))?;
    socket
        .set_reuse_address(true)
        .map_err(StepError::at(Step::ReuseAddress))?;
    size_buffers(&socket, config.tcp_tx_size(), config.tcp_rx_size())
        .map_err(StepError::at(Step::Buffers))?;
    socket
        .bind(&SockAddr::from(wildcard(port)))
        .map_err(StepError::at(Step::Bind))?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(StepError::at(Step::Listen))?;
    Ok(socket)
}

/// Open and bind a non-blocking best-effort socket.
pub(crate) fn datagram_socket(config: &TransportConfig, addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(true)?;
    size_buffers(&socket, config.udp_tx_size(), config.udp_rx_size())?;
    socket.bind(&SockAddr::from(addr))?;
    Ok(socket)
}

/// Zero-timeout check for a connection waiting on a listening socket.
///
/// Asks the kernel directly, so the answer does not depend on when the
/// reactor last ran. An interrupted poll reads as nothing pending.
pub(crate) fn poll_pending(socket: &Socket) -> io::Result<bool> {
    let mut fds = [PollFd::new(socket.as_fd(), PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::ZERO) {
        Ok(0) | Err(Errno::EINTR) => Ok(false),
        Ok(_) => Ok(fds[0]
            .revents()
            .is_some_and(|events| events.contains(PollFlags::POLLIN))),
        Err(errno) => Err(errno.into()),
    }
}

/// Register an accepted socket with the reactor.
///
/// Accepted sockets do not inherit the listener's non-blocking flag, so it
/// is set here before the reactor sees the socket.
pub(crate) fn accepted_stream(socket: Socket) -> io::Result<AsyncFd<TcpStream>> {
    socket.set_nonblocking(true)?;
    AsyncFd::new(TcpStream::from(socket))
}
