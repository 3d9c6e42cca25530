//! Events emitted while a session dials, drops and redials its transport.

use std::time::{Duration, Instant};

use beanstalk_resilience_core::ResilienceEvent;

/// Why a dial loop stopped without a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// The caller's cancellation token fired.
    Cancelled,
    /// The configured attempt cap was reached.
    MaxAttempts,
    /// The operation only allows a single dial (reservation).
    SingleAttempt,
}

/// Events emitted by [`Reconn`](crate::Reconn).
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    /// A dial succeeded and the transport is now live.
    Connected {
        session_name: String,
        timestamp: Instant,
        /// Dials it took, including the successful one.
        attempts: u32,
    },
    /// A dial failed.
    DialFailed {
        session_name: String,
        timestamp: Instant,
        attempt: u32,
        /// Wait before the next dial; `None` when the loop gives up.
        delay: Option<Duration>,
    },
    /// The live transport failed mid-command and was discarded.
    Disconnected {
        session_name: String,
        timestamp: Instant,
        operation: &'static str,
    },
    /// The dial loop stopped without a connection.
    GaveUp {
        session_name: String,
        timestamp: Instant,
        attempts: u32,
        reason: GiveUpReason,
    },
}

impl ResilienceEvent for ReconnectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconnectEvent::Connected { .. } => "connected",
            ReconnectEvent::DialFailed { .. } => "dial_failed",
            ReconnectEvent::Disconnected { .. } => "disconnected",
            ReconnectEvent::GaveUp { .. } => "gave_up",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ReconnectEvent::Connected { timestamp, .. }
            | ReconnectEvent::DialFailed { timestamp, .. }
            | ReconnectEvent::Disconnected { timestamp, .. }
            | ReconnectEvent::GaveUp { timestamp, .. } => *timestamp,
        }
    }

    fn session_name(&self) -> &str {
        match self {
            ReconnectEvent::Connected { session_name, .. }
            | ReconnectEvent::DialFailed { session_name, .. }
            | ReconnectEvent::Disconnected { session_name, .. }
            | ReconnectEvent::GaveUp { session_name, .. } => session_name,
        }
    }
}
