//! Build-time constants for the capture transport.
//!
//! These values size the network stack and pace its retry loops. They are
//! fixed at build time and are not runtime-configurable.

use std::time::Duration;

// =============================================================================
// MEMORY GRANULARITY
// =============================================================================

/// Allocation granularity of the platform network stack.
pub const PAGE_SIZE: usize = 0x1000;

// =============================================================================
// RELIABLE TRANSPORT (TCP)
// =============================================================================

/// Default reliable-transport receive buffer size.
///
/// The peer only sends small control messages, so this stays small.
pub const TCP_RX_SIZE: usize = 0x2000;

/// Default reliable-transport maximum receive size (0 = same as [`TCP_RX_SIZE`]).
pub const TCP_RX_MAX_SIZE: usize = 0;

/// Pending-connection backlog. Exactly one remote peer is expected.
pub const LISTEN_BACKLOG: i32 = 1;

// =============================================================================
// BEST-EFFORT TRANSPORT (UDP)
// =============================================================================

/// Default best-effort transmit buffer size.
pub const UDP_TX_SIZE: usize = 0x4000;

/// Default best-effort receive buffer size.
pub const UDP_RX_SIZE: usize = 0x1000;

// =============================================================================
// SOCKET BUFFER EFFICIENCY
// =============================================================================

/// Multiplier applied to the page-aligned buffer sum.
///
/// Lower values cause random stalls over long streaming sessions.
pub const SOCKET_EFFICIENCY: usize = 2;

// =============================================================================
// PAYLOAD CLASSES (inputs from the packet builder)
// =============================================================================

/// Header prepended to every packet by the packet builder.
pub const PACKET_HEADER_SIZE: usize = 0x10;

/// Largest encoded video packet (header + payload).
pub const MAX_VIDEO_PACKET: usize = PACKET_HEADER_SIZE + 0x54000;

/// Largest encoded audio packet (header + payload).
pub const MAX_AUDIO_PACKET: usize = PACKET_HEADER_SIZE + 0x3000;

/// Largest packetized unit handed to the socket in a single write.
pub const MAX_PACKET_UNIT: usize = 0xFFFF;

// =============================================================================
// RETRY PACING
// =============================================================================

/// Suspension between listener creation attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(1);
