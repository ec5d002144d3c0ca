//! Static memory budgeting for the network stack.
//!
//! The stack allocates every socket buffer out of one region whose size is
//! computed here, at compile time, from the buffer classes of both
//! transports.

use crate::core::ConfigError;
use crate::core::constants::{
    MAX_AUDIO_PACKET, MAX_PACKET_UNIT, MAX_VIDEO_PACKET, PAGE_SIZE, SOCKET_EFFICIENCY,
    TCP_RX_MAX_SIZE, TCP_RX_SIZE, UDP_RX_SIZE, UDP_TX_SIZE,
};

/// Round `size` up to the allocation granularity.
#[inline]
pub const fn page_align(size: usize) -> usize {
    (size + (PAGE_SIZE - 1)) & !(PAGE_SIZE - 1)
}

const fn checked_page_align(size: usize) -> Option<usize> {
    match size.checked_add(PAGE_SIZE - 1) {
        Some(padded) => Some(padded & !(PAGE_SIZE - 1)),
        None => None,
    }
}

/// `value`, or `fallback` when `value` is zero.
const fn non_zero_or(value: usize, fallback: usize) -> usize {
    if value == 0 { fallback } else { value }
}

/// Largest packet produced per payload class by the packet builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimits {
    /// Largest video packet, header included.
    pub video: usize,
    /// Largest audio packet, header included.
    pub audio: usize,
    /// Largest packetized unit written to a socket in one call.
    pub packet: usize,
}

impl PayloadLimits {
    /// Limits of the stock capture pipeline.
    pub const DEFAULT: Self = Self {
        video: MAX_VIDEO_PACKET,
        audio: MAX_AUDIO_PACKET,
        packet: MAX_PACKET_UNIT,
    };
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Immutable buffer budget handed to the network stack.
///
/// Built with `const` builder methods so a configuration, and the size of
/// its backing region, can be fixed at compile time:
///
/// ```
/// use capture_net::transport::TransportConfig;
///
/// const CONFIG: TransportConfig = TransportConfig::DEFAULT.with_udp(0x8000, 0x1000);
/// const SIZE: usize = CONFIG.backing_memory_size();
/// assert_eq!(SIZE % 0x1000, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    tcp_tx_size: usize,
    tcp_rx_size: usize,
    tcp_tx_max_size: usize,
    tcp_rx_max_size: usize,
    udp_tx_size: usize,
    udp_rx_size: usize,
    efficiency: usize,
}

impl TransportConfig {
    /// Configuration derived from [`PayloadLimits::DEFAULT`].
    pub const DEFAULT: Self = Self::for_payloads(PayloadLimits::DEFAULT);

    /// Derive a configuration from the packet builder's limits.
    ///
    /// The reliable transmit ceiling must hold one video and one audio
    /// packet at the same time.
    pub const fn for_payloads(limits: PayloadLimits) -> Self {
        Self {
            tcp_tx_size: limits.packet,
            tcp_rx_size: TCP_RX_SIZE,
            tcp_tx_max_size: page_align(limits.video) + page_align(limits.audio),
            tcp_rx_max_size: TCP_RX_MAX_SIZE,
            udp_tx_size: UDP_TX_SIZE,
            udp_rx_size: UDP_RX_SIZE,
            efficiency: SOCKET_EFFICIENCY,
        }
    }

    /// Set the reliable-transport transmit and receive buffer sizes.
    pub const fn with_tcp(mut self, tx: usize, rx: usize) -> Self {
        self.tcp_tx_size = tx;
        self.tcp_rx_size = rx;
        self
    }

    /// Set the reliable-transport maximum sizes. Zero falls back to the base size.
    pub const fn with_tcp_max(mut self, tx_max: usize, rx_max: usize) -> Self {
        self.tcp_tx_max_size = tx_max;
        self.tcp_rx_max_size = rx_max;
        self
    }

    /// Set the best-effort transmit and receive buffer sizes.
    pub const fn with_udp(mut self, tx: usize, rx: usize) -> Self {
        self.udp_tx_size = tx;
        self.udp_rx_size = rx;
        self
    }

    /// Set the efficiency multiplier.
    pub const fn with_efficiency(mut self, efficiency: usize) -> Self {
        self.efficiency = efficiency;
        self
    }

    /// Reliable-transport transmit buffer size.
    pub const fn tcp_tx_size(&self) -> usize {
        self.tcp_tx_size
    }

    /// Reliable-transport receive buffer size.
    pub const fn tcp_rx_size(&self) -> usize {
        self.tcp_rx_size
    }

    /// Reliable-transport transmit ceiling (falls back to the base size).
    pub const fn tcp_tx_max_size(&self) -> usize {
        non_zero_or(self.tcp_tx_max_size, self.tcp_tx_size)
    }

    /// Reliable-transport receive ceiling (falls back to the base size).
    pub const fn tcp_rx_max_size(&self) -> usize {
        non_zero_or(self.tcp_rx_max_size, self.tcp_rx_size)
    }

    /// Best-effort transmit buffer size.
    pub const fn udp_tx_size(&self) -> usize {
        self.udp_tx_size
    }

    /// Best-effort receive buffer size.
    pub const fn udp_rx_size(&self) -> usize {
        self.udp_rx_size
    }

    /// Efficiency multiplier.
    pub const fn efficiency(&self) -> usize {
        self.efficiency
    }

    /// Sum of the four buffer classes, before alignment.
    const fn buffer_sum(&self) -> Option<usize> {
        let tcp = match self.tcp_tx_max_size().checked_add(self.tcp_rx_max_size()) {
            Some(n) => n,
            None => return None,
        };
        let udp = match self.udp_tx_size.checked_add(self.udp_rx_size) {
            Some(n) => n,
            None => return None,
        };
        tcp.checked_add(udp)
    }

    /// Size of the backing region required by this configuration.
    ///
    /// `page_align(tcp_tx_max + tcp_rx_max + udp_tx + udp_rx) * efficiency`.
    /// Configurations that fail [`validate`](Self::validate) with
    /// [`ConfigError::Overflow`] must not call this.
    pub const fn backing_memory_size(&self) -> usize {
        page_align(
            self.tcp_tx_max_size() + self.tcp_rx_max_size() + self.udp_tx_size + self.udp_rx_size,
        ) * self.efficiency
    }

    /// Overflow-checked [`backing_memory_size`](Self::backing_memory_size).
    pub const fn checked_backing_memory_size(&self) -> Option<usize> {
        let sum = match self.buffer_sum() {
            Some(n) => n,
            None => return None,
        };
        match checked_page_align(sum) {
            Some(aligned) => aligned.checked_mul(self.efficiency),
            None => None,
        }
    }

    /// Reject configurations no network stack could honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.efficiency == 0 {
            return Err(ConfigError::ZeroEfficiency);
        }

        let base = [
            ("tcp tx", self.tcp_tx_size),
            ("tcp rx", self.tcp_rx_size),
            ("udp tx", self.udp_tx_size),
            ("udp rx", self.udp_rx_size),
        ];
        if let Some((name, _)) = base.into_iter().find(|&(_, size)| size == 0) {
            return Err(ConfigError::EmptyBuffer(name));
        }

        self.checked_backing_memory_size()
            .map(|_| ())
            .ok_or(ConfigError::Overflow)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Backing region size of [`TransportConfig::DEFAULT`].
pub const DEFAULT_BACKING_SIZE: usize = TransportConfig::DEFAULT.backing_memory_size();

/// A page-aligned, fixed-size region the network stack allocates from.
///
/// `new` is `const`, so the region can be placed in a `static` or on the
/// stack without any allocation by this crate.
#[derive(Debug)]
#[repr(C, align(4096))]
pub struct BackingMemory<const N: usize>([u8; N]);

const _: () = assert!(align_of::<BackingMemory<0>>() == PAGE_SIZE);

impl<const N: usize> BackingMemory<N> {
    /// A zeroed region.
    pub const fn new() -> Self {
        Self([0; N])
    }

    /// Size of the region in bytes.
    pub const fn len(&self) -> usize {
        N
    }

    /// Returns `true` for a zero-sized region.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// The region as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl<const N: usize> Default for BackingMemory<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Backing region sized for [`TransportConfig::DEFAULT`].
pub type DefaultBackingMemory = BackingMemory<DEFAULT_BACKING_SIZE>;
