//! An accepted (or directly opened) reliable-transport connection.
//!
//! Every send and receive attempt is a single non-blocking system call on the
//! socket; the reactor is only consulted to wait for writability inside
//! [`Connection::send_all`].

use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::net::{Shutdown, SocketAddr, TcpStream};

use socket2::SockRef;
use tokio::io::unix::AsyncFd;
use tokio::net::TcpSocket;
use tracing::{debug, warn};

use super::service::TransportService;
use super::signal::RunSignal;
use crate::core::{NetworkStack, TransportError, TransportResult};

/// A connected, non-blocking stream to the peer.
///
/// The handle is invalidated by [`close`](Self::close) and by any hard
/// transport error; afterwards every operation fails with
/// [`TransportError::NotConnected`].
#[derive(Debug)]
pub struct Connection<'s> {
    fd: Option<AsyncFd<TcpStream>>,
    _service: PhantomData<&'s ()>,
}

impl<'s> Connection<'s> {
    pub(crate) fn new(fd: AsyncFd<TcpStream>) -> Self {
        Self {
            fd: Some(fd),
            _service: PhantomData,
        }
    }

    /// Connect to `addr` with buffers sized from the service budget.
    pub async fn connect<S: NetworkStack>(
        service: &'s TransportService<'_, S>,
        addr: SocketAddr,
    ) -> TransportResult<Self> {
        service.ensure_ready()?;
        let config = service.config();

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_send_buffer_size(clamp_u32(config.tcp_tx_size()))?;
        socket.set_recv_buffer_size(clamp_u32(config.tcp_rx_size()))?;

        // into_std leaves the stream in non-blocking mode
        let stream = socket.connect(addr).await?.into_std()?;
        debug!(peer = %addr, "connected");
        Ok(Self::new(AsyncFd::new(stream)?))
    }

    /// Send the whole of `buf`, waiting for buffer space as needed.
    ///
    /// While waiting, `running` is observed; once it reads as stopped the
    /// call returns [`TransportError::Cancelled`] with the connection still
    /// open and an unknown prefix of `buf` sent. A hard error closes the
    /// connection and is returned as [`TransportError::Io`].
    ///
    /// An empty buffer succeeds without touching the socket.
    pub async fn send_all(&mut self, buf: &[u8], running: &RunSignal) -> TransportResult<()> {
        let mut sent = 0;
        loop {
            let fd = self.fd.as_ref().ok_or(TransportError::NotConnected)?;
            if sent == buf.len() {
                return Ok(());
            }

            let mut stream = fd.get_ref();
            match stream.write(&buf[sent..]) {
                Ok(0) => return Err(self.fail(io::ErrorKind::WriteZero.into())),
                Ok(n) => sent += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if !running.is_running() {
                        debug!(sent, total = buf.len(), "send cancelled");
                        return Err(TransportError::Cancelled);
                    }

                    let ready = tokio::select! {
                        biased;
                        () = running.stopped() => None,
                        ready = fd.writable() => Some(ready),
                    };
                    let waited = match ready {
                        None => {
                            debug!(sent, total = buf.len(), "send cancelled");
                            return Err(TransportError::Cancelled);
                        }
                        Some(Ok(mut guard)) => {
                            // the next write decides whether space really freed up
                            guard.clear_ready();
                            Ok(())
                        }
                        Some(Err(err)) => Err(err),
                    };
                    if let Err(err) = waited {
                        return Err(self.fail(err));
                    }
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
    }

    /// Receive whatever is available right now, at most `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` when no data is pending, and only then. An orderly
    /// close by the peer is [`TransportError::PeerClosed`] rather than the
    /// plain `0` a `read(2)`-style loop would expect, so a caller polling a
    /// departed peer stops instead of spinning. `PeerClosed` and any hard
    /// error close the connection.
    pub fn recv(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        let fd = self.fd.as_ref().ok_or(TransportError::NotConnected)?;

        let mut stream = fd.get_ref();
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.close();
                Err(TransportError::PeerClosed)
            }
            Ok(n) => Ok(n),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Stop receiving while keeping the send direction usable.
    ///
    /// Failure is logged and otherwise ignored.
    pub fn shutdown_receive(&self) {
        let Some(fd) = self.fd.as_ref() else {
            return;
        };
        if let Err(err) = SockRef::from(fd.get_ref()).shutdown(Shutdown::Read) {
            warn!(error = %err, "failed to shut down receive direction");
        }
    }

    /// The peer's address.
    pub fn peer_addr(&self) -> TransportResult<SocketAddr> {
        let fd = self.fd.as_ref().ok_or(TransportError::NotConnected)?;
        Ok(fd.get_ref().peer_addr()?)
    }

    /// The local address.
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        let fd = self.fd.as_ref().ok_or(TransportError::NotConnected)?;
        Ok(fd.get_ref().local_addr()?)
    }

    /// Whether the connection still holds its socket.
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Release the socket. No-op if already closed.
    pub fn close(&mut self) {
        if self.fd.take().is_some() {
            debug!("connection closed");
        }
    }

    fn fail(&mut self, err: io::Error) -> TransportError {
        warn!(error = %err, "connection lost");
        self.fd = None;
        TransportError::Io(err)
    }
}

fn clamp_u32(size: usize) -> u32 {
    u32::try_from(size).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::signal::run_signal;
    use crate::transport::test_util;
    use crate::transport::Listener;
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tracing_test::traced_test;

    /// An accepted connection and the client end talking to it.
    async fn pair<'s>(
        service: &'s TransportService<'static>,
    ) -> (Connection<'s>, tokio::net::TcpStream) {
        let mut listener = Listener::open(service, 0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(conn) = listener.accept().unwrap() {
                return (conn, client);
            }
            assert!(Instant::now() < deadline, "no connection accepted");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_send_all_delivers_in_order() {
        let service = test_util::service();
        let (mut conn, mut client) = pair(&service).await;
        let (_controller, running) = run_signal();
        let payload = pattern(64 * 1024);

        let mut received = vec![0u8; payload.len()];
        let (sent, read) = tokio::join!(
            conn.send_all(&payload, &running),
            client.read_exact(&mut received)
        );

        sent.unwrap();
        read.unwrap();
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_send_all_waits_for_slow_reader() {
        let service = test_util::service();
        let (mut conn, mut client) = pair(&service).await;
        let (_controller, running) = run_signal();
        let payload = pattern(4 * 1024 * 1024);

        let reader = async {
            let mut received = Vec::with_capacity(payload.len());
            let mut chunk = vec![0u8; 64 * 1024];
            while received.len() < payload.len() {
                let n = client.read(&mut chunk).await.unwrap();
                assert_ne!(n, 0, "stream ended early");
                received.extend_from_slice(&chunk[..n]);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            received
        };

        let (sent, received) = tokio::time::timeout(Duration::from_secs(30), async {
            tokio::join!(conn.send_all(&payload, &running), reader)
        })
        .await
        .expect("transfer stalled");

        sent.unwrap();
        assert!(received == payload);
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn test_empty_send_succeeds() {
        let service = test_util::service();
        let (mut conn, _client) = pair(&service).await;
        let (controller, running) = run_signal();
        controller.stop();

        conn.send_all(&[], &running).await.unwrap();
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn test_send_all_cancelled_when_stopped() {
        let service = test_util::service();
        // the client never reads, so the send eventually has to wait
        let (mut conn, _client) = pair(&service).await;
        let (controller, running) = run_signal();
        let payload = pattern(32 * 1024 * 1024);

        let stop = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            controller.stop();
            Instant::now()
        };
        let ((result, returned_at), stopped_at) = tokio::time::timeout(
            Duration::from_secs(10),
            async {
                tokio::join!(
                    async {
                        let result = conn.send_all(&payload, &running).await;
                        (result, Instant::now())
                    },
                    stop
                )
            },
        )
        .await
        .expect("send_all ignored the stop signal");

        assert!(matches!(result, Err(TransportError::Cancelled)));
        assert!(returned_at.duration_since(stopped_at) < Duration::from_secs(1));
        // cancellation is not a transport failure
        assert!(conn.is_open());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_peer_disconnect_invalidates_connection() {
        let service = test_util::service();
        let (mut conn, client) = pair(&service).await;
        let (_controller, running) = run_signal();
        drop(client);

        let payload = pattern(32 * 1024 * 1024);
        let result = tokio::time::timeout(Duration::from_secs(10), conn.send_all(&payload, &running))
            .await
            .expect("send_all hung on a dead peer");

        assert!(matches!(result, Err(TransportError::Io(_))));
        assert!(!conn.is_open());
        assert!(logs_contain("connection lost"));

        // no further attempts on an invalid handle
        let again = conn.send_all(b"x", &running).await;
        assert!(matches!(again, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_io() {
        let service = test_util::service();
        let (mut conn, _client) = pair(&service).await;
        let (_controller, running) = run_signal();

        conn.close();
        conn.close();

        assert!(!conn.is_open());
        assert!(matches!(
            conn.send_all(&[], &running).await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            conn.recv(&mut [0u8; 16]),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(conn.peer_addr(), Err(TransportError::NotConnected)));
        // no-op on a closed handle
        conn.shutdown_receive();
    }

    #[tokio::test]
    async fn test_recv_without_data_returns_zero() {
        let service = test_util::service();
        let (mut conn, _client) = pair(&service).await;

        let mut buf = [0u8; 64];
        for _ in 0..3 {
            assert_eq!(conn.recv(&mut buf).unwrap(), 0);
        }
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn test_recv_returns_available_data() {
        let service = test_util::service();
        let (mut conn, mut client) = pair(&service).await;
        client.write_all(b"hello").await.unwrap();

        let mut buf = [0u8; 64];
        let deadline = Instant::now() + Duration::from_secs(5);
        let n = loop {
            let n = conn.recv(&mut buf).unwrap();
            if n > 0 {
                break n;
            }
            assert!(Instant::now() < deadline, "data never arrived");
            tokio::time::sleep(Duration::from_millis(1)).await;
        };

        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn test_recv_reports_peer_close() {
        let service = test_util::service();
        let (mut conn, client) = pair(&service).await;
        drop(client);

        let mut buf = [0u8; 64];
        let deadline = Instant::now() + Duration::from_secs(5);
        let err = loop {
            match conn.recv(&mut buf) {
                Ok(0) => {}
                Ok(n) => panic!("unexpected {n} bytes"),
                Err(err) => break err,
            }
            assert!(Instant::now() < deadline, "close never observed");
            tokio::time::sleep(Duration::from_millis(1)).await;
        };

        assert!(err.is_connection_lost());
        assert!(matches!(err, TransportError::PeerClosed));
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_shutdown_receive_keeps_send_direction() {
        let service = test_util::service();
        let (mut conn, mut client) = pair(&service).await;
        let (_controller, running) = run_signal();

        conn.shutdown_receive();
        conn.send_all(b"ping", &running).await.unwrap();

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_connect_to_listener() {
        let service = test_util::service();
        let mut listener = Listener::open(&service, 0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (_controller, running) = run_signal();

        let mut client = Connection::connect(&service, ([127, 0, 0, 1], port).into())
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut server = loop {
            if let Some(conn) = listener.accept().unwrap() {
                break conn;
            }
            assert!(Instant::now() < deadline, "no connection accepted");
            tokio::time::sleep(Duration::from_millis(2)).await;
        };
        assert_eq!(server.peer_addr().unwrap(), client.local_addr().unwrap());

        client.send_all(b"frame", &running).await.unwrap();
        let mut buf = [0u8; 16];
        let mut got = 0;
        while got < 5 {
            got += server.recv(&mut buf[got..]).unwrap();
            assert!(Instant::now() < deadline, "data never arrived");
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(&buf[..5], b"frame");
    }

    #[tokio::test]
    async fn test_connect_requires_initialized_service() {
        let service = test_util::uninitialized_service();
        let err = Connection::connect(&service, ([127, 0, 0, 1], 9).into())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotReady));
    }
}
