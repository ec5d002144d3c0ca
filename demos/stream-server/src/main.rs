//! capture-net stream server
//!
//! Streams synthetic frames to a single client over the reliable transport
//! and mirrors each frame header as a best-effort datagram.
//!
//! Environment variables:
//! - CAPTURE_NET_PORT: listening port (default 9911)
//! - CAPTURE_NET_UDP_TARGET: `host:port` receiving frame headers (optional)
//! - CAPTURE_NET_LOG: tracing filter (default "info")

mod config;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use capture_net::core::constants::{PACKET_HEADER_SIZE, RETRY_INTERVAL};
use capture_net::prelude::*;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::DemoConfig;

/// Frame period, roughly 30 frames per second.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Synthetic payload bytes per frame.
const FRAME_PAYLOAD: usize = 32 * 1024;

const FRAME_MAGIC: [u8; 4] = *b"CNET";

#[tokio::main]
async fn main() -> ExitCode {
    let config = match DemoConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("stream-server: {err}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut memory = Box::new(DefaultBackingMemory::new());
    let mut service = TransportService::host(TransportConfig::DEFAULT, memory.as_mut_slice());
    if let Err(err) = service.initialize() {
        error!(error = %err, "transport initialization failed");
        return ExitCode::FAILURE;
    }

    let (controller, running) = run_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
        }
        controller.stop();
    });

    let result = serve(&service, &config, &running).await;
    service.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server failed");
            ExitCode::FAILURE
        }
    }
}

/// Accept one client at a time and stream to it until it leaves.
async fn serve(
    service: &TransportService<'_>,
    config: &DemoConfig,
    running: &RunSignal,
) -> TransportResult<()> {
    let mirror = match config.udp_target {
        Some(target) => Some((DatagramSocket::open(service)?, target)),
        None => None,
    };

    while running.is_running() {
        let mut listener = tokio::select! {
            listener = Listener::open(service, config.port) => listener?,
            () = running.stopped() => break,
        };
        info!(port = config.port, "waiting for client");

        let accepted = loop {
            if !running.is_running() {
                return Ok(());
            }
            match listener.accept() {
                Ok(Some(conn)) => break Some(conn),
                Ok(None) => tokio::time::sleep(RETRY_INTERVAL).await,
                Err(err) if err.is_link_down() => {
                    warn!("network stack went away, reopening listener");
                    break None;
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
            }
        };
        listener.close();

        if let Some(mut conn) = accepted {
            stream(&mut conn, mirror.as_ref(), running).await;
            conn.close();
        }
    }

    Ok(())
}

/// Stream frames until the client leaves or the server stops.
async fn stream(
    conn: &mut Connection<'_>,
    mirror: Option<&(DatagramSocket<'_>, SocketAddr)>,
    running: &RunSignal,
) {
    let peer = conn.peer_addr().ok();
    info!(?peer, "streaming");

    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    let mut frame = vec![0u8; PACKET_HEADER_SIZE + FRAME_PAYLOAD];
    let mut inbound = [0u8; 512];
    let mut sequence: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = running.stopped() => return,
        }

        fill_frame(&mut frame, sequence);
        match conn.send_all(&frame, running).await {
            Ok(()) => {}
            Err(TransportError::Cancelled) => return,
            Err(err) => {
                info!(?peer, error = %err, "client gone");
                return;
            }
        }

        if let Some((socket, target)) = mirror {
            if let Err(err) = socket.send_to(&frame[..PACKET_HEADER_SIZE], *target) {
                debug!(error = %err, "header datagram dropped");
            }
        }

        // clients may send keepalives; they carry nothing we act on
        loop {
            match conn.recv(&mut inbound) {
                Ok(0) => break,
                Ok(n) => debug!(bytes = n, "client data"),
                Err(err) => {
                    info!(?peer, error = %err, "client gone");
                    return;
                }
            }
        }

        sequence = sequence.wrapping_add(1);
    }
}

/// Write the header and a sequence-dependent test pattern.
fn fill_frame(frame: &mut [u8], sequence: u32) {
    let (header, payload) = frame.split_at_mut(PACKET_HEADER_SIZE);
    let len = payload.len() as u32;

    header[..4].copy_from_slice(&FRAME_MAGIC);
    header[4..8].copy_from_slice(&sequence.to_le_bytes());
    header[8..12].copy_from_slice(&len.to_le_bytes());
    header[12..].fill(0);

    let seed = sequence as u8;
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = seed.wrapping_add(i as u8);
    }
}
