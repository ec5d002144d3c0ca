//! Link-state heuristic.
//!
//! Some platforms give no notification when the network stack is suspended
//! (e.g. across a device sleep/wake cycle). The only observable symptom is a
//! listener whose readiness poll reports a pending connection while the
//! accept itself would block. This module turns that symptom into a
//! [`LinkState`]. False negatives are possible.

use std::io;

use crate::core::LinkMonitor;

/// State of the underlying network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// The stack is usable; the error concerns a single socket at most.
    Up,
    /// The stack itself is unavailable. Listening sockets must be recreated.
    Down,
}

/// Default [`LinkMonitor`]: would-block right after a fresh readiness report
/// means the stack is down.
#[derive(Debug, Clone, Copy, Default)]
pub struct WouldBlockHeuristic;

impl LinkMonitor for WouldBlockHeuristic {
    fn classify(&self, err: &io::Error, after_readiness: bool) -> LinkState {
        if after_readiness && err.kind() == io::ErrorKind::WouldBlock {
            LinkState::Down
        } else {
            LinkState::Up
        }
    }
}
