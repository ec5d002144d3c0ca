//! Transport service lifecycle.
//!
//! The service is the explicit context every socket is created from. It
//! owns the backing memory for its lifetime and guards the one-time
//! start/stop of the platform network stack.

use tracing::{debug, info};

use super::budget::TransportConfig;
use crate::core::constants::PAGE_SIZE;
use crate::core::{ConfigError, NetworkStack, TransportError, TransportResult};

/// [`NetworkStack`] for hosted targets.
///
/// The host kernel owns its own socket memory, so the region is only
/// checked against the budget. Sockets created through the service are sized
/// from the configuration instead.
#[derive(Debug, Default)]
pub struct HostStack {
    started: bool,
}

impl HostStack {
    /// Create a stopped host stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`NetworkStack::start`] succeeded and `stop` has not run since.
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl NetworkStack for HostStack {
    fn start(&mut self, config: &TransportConfig, memory: &mut [u8]) -> Result<(), ConfigError> {
        config.validate()?;

        let required = config.backing_memory_size();
        if memory.len() < required {
            return Err(ConfigError::RegionTooSmall {
                required,
                actual: memory.len(),
            });
        }
        if memory.as_ptr() as usize % PAGE_SIZE != 0 {
            return Err(ConfigError::RegionMisaligned);
        }

        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }
}

/// The process-wide transport context.
///
/// # Lifecycle
///
/// - [`initialize`](Self::initialize) starts the stack once; further calls
///   are no-ops.
/// - [`shutdown`](Self::shutdown) stops it once; further calls are no-ops.
///   Dropping the service shuts it down.
/// - Listeners, connections and datagram sockets borrow the service, so it
///   cannot be shut down while any of them is alive.
#[derive(Debug)]
pub struct TransportService<'m, S: NetworkStack = HostStack> {
    config: TransportConfig,
    memory: &'m mut [u8],
    stack: S,
    ready: bool,
}

impl<'m> TransportService<'m, HostStack> {
    /// Create a service backed by the host network stack.
    pub fn host(config: TransportConfig, memory: &'m mut [u8]) -> Self {
        Self::new(config, memory, HostStack::new())
    }
}

impl<'m, S: NetworkStack> TransportService<'m, S> {
    /// Create an uninitialized service.
    pub fn new(config: TransportConfig, memory: &'m mut [u8], stack: S) -> Self {
        Self {
            config,
            memory,
            stack,
            ready: false,
        }
    }

    /// Zero the backing memory and start the network stack.
    ///
    /// A rejection is a build-time misconfiguration: it is returned as
    /// [`TransportError::Misconfigured`] and must abort startup.
    pub fn initialize(&mut self) -> TransportResult<()> {
        if self.ready {
            return Ok(());
        }

        self.memory.fill(0);

        debug!(region = self.memory.len(), "initializing network stack");
        self.stack
            .start(&self.config, self.memory)
            .map_err(TransportError::Misconfigured)?;

        // the stack has validated the budget, so the size cannot overflow
        info!(
            size = format_args!("{:#x}", self.config.backing_memory_size()),
            "network stack started"
        );
        self.ready = true;
        Ok(())
    }

    /// Stop the network stack.
    ///
    /// All listeners and connections must be closed first; the borrow
    /// checker enforces this for sockets created from this service.
    pub fn shutdown(&mut self) {
        if !self.ready {
            return;
        }

        info!("shutting down network stack");
        self.stack.stop();
        self.ready = false;
    }

    /// Whether the service is initialized.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The buffer budget.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The network stack.
    pub fn stack(&self) -> &S {
        &self.stack
    }

    /// Fail with [`TransportError::NotReady`] unless initialized.
    pub(crate) fn ensure_ready(&self) -> TransportResult<()> {
        if self.ready {
            Ok(())
        } else {
            debug!("transport service used before initialize");
            Err(TransportError::NotReady)
        }
    }
}

impl<S: NetworkStack> Drop for TransportService<'_, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
