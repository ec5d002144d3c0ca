//! Demo configuration from the environment.

use std::env;
use std::net::SocketAddr;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9911;

/// Default log filter.
pub const DEFAULT_LOG: &str = "info";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `CAPTURE_NET_PORT` is not a port number.
    #[error("invalid CAPTURE_NET_PORT {0:?}")]
    Port(String),

    /// `CAPTURE_NET_UDP_TARGET` is not a socket address.
    #[error("invalid CAPTURE_NET_UDP_TARGET {0:?}")]
    UdpTarget(String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Port the stream listener binds on all interfaces.
    pub port: u16,
    /// Where frame headers are mirrored as datagrams, if anywhere.
    pub udp_target: Option<SocketAddr>,
    /// `tracing` filter directive.
    pub log: String,
}

impl DemoConfig {
    /// Read `CAPTURE_NET_PORT`, `CAPTURE_NET_UDP_TARGET` and `CAPTURE_NET_LOG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("CAPTURE_NET_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Port(raw))?,
            None => DEFAULT_PORT,
        };
        let udp_target = match lookup("CAPTURE_NET_UDP_TARGET") {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::UdpTarget(raw))?,
            ),
            _ => None,
        };
        let log = lookup("CAPTURE_NET_LOG").unwrap_or_else(|| DEFAULT_LOG.to_owned());

        Ok(Self {
            port,
            udp_target,
            log,
        })
    }
}
