//! Observable connection state of a session.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Where a session stands with respect to its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A live transport is held.
    Connected,

    /// No transport is held; the next operation will dial.
    Disconnected,

    /// A dial loop is in progress.
    Reconnecting,
}

/// Shared, cheaply cloneable view of a session's connection state.
///
/// The session updates it; clones handed to other tasks can read it
/// without touching the session itself.
#[derive(Clone)]
pub struct ReconnectState {
    state: Arc<AtomicU8>,

    /// Failed dials in the current dial loop; reset on success.
    attempts: Arc<AtomicU32>,

    /// Successful dials over the session's lifetime.
    connections: Arc<AtomicU64>,

    /// Transports discarded after a network failure.
    disconnects: Arc<AtomicU64>,
}

impl ReconnectState {
    /// Creates a state that starts out disconnected.
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(Self::encode_state(
                ConnectionState::Disconnected,
            ))),
            attempts: Arc::new(AtomicU32::new(0)),
            connections: Arc::new(AtomicU64::new(0)),
            disconnects: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        Self::decode_state(self.state.load(Ordering::Acquire))
    }

    /// Failed dials since the last successful one.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Number of transports this session has established by dialing.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Acquire)
    }

    /// Number of transports discarded after a network failure.
    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Acquire)
    }

    pub(crate) fn mark_connected(&self) {
        self.set_state(ConnectionState::Connected);
        self.attempts.store(0, Ordering::Release);
        self.connections.fetch_add(1, Ordering::AcqRel);
    }

    /// Adopting a transport that was not dialed by the session.
    pub(crate) fn mark_adopted(&self) {
        self.set_state(ConnectionState::Connected);
    }

    pub(crate) fn mark_reconnecting(&self) {
        self.set_state(ConnectionState::Reconnecting);
    }

    pub(crate) fn mark_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    pub(crate) fn mark_dropped(&self) {
        self.mark_disconnected();
        self.disconnects.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_failed_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn set_state(&self, state: ConnectionState) {
        self.state
            .store(Self::encode_state(state), Ordering::Release);
    }

    fn encode_state(state: ConnectionState) -> u8 {
        match state {
            ConnectionState::Connected => 0,
            ConnectionState::Disconnected => 1,
            ConnectionState::Reconnecting => 2,
        }
    }

    fn decode_state(encoded: u8) -> ConnectionState {
        match encoded {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Disconnected,
            _ => ConnectionState::Reconnecting,
        }
    }
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReconnectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectState")
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .field("connections", &self.connections())
            .field("disconnects", &self.disconnects())
            .finish()
    }
}
