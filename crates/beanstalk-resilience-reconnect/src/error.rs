//! Error types for reconnecting sessions.

use std::io;

use beanstalk_resilience_proto::{Error as ConnError, ProtocolError};

/// Errors returned by [`Reconn`](crate::Reconn) and its bindings.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
    /// Dialing failed and the dial loop stopped: the caller cancelled, or
    /// the operation only allows a single dial.
    #[error("dial failed: {0}")]
    Dial(#[source] io::Error),

    /// The configured dial cap was reached.
    #[error("gave up after {attempts} dial attempts: {source}")]
    MaxAttemptsExceeded {
        /// Dials made before giving up.
        attempts: u32,
        /// The last dial error.
        #[source]
        source: io::Error,
    },

    /// The command reached a live connection and failed there.
    ///
    /// Under the retrying operations this is always a protocol-level or
    /// name-validation failure; network failures are only surfaced by
    /// reservations that do not retry.
    #[error(transparent)]
    Conn(#[from] ConnError),
}

impl ReconnectError {
    /// Returns true when the failure came from the network rather than the
    /// server: a failed dial or a lost transport.
    pub fn is_network(&self) -> bool {
        match self {
            ReconnectError::Dial(_) | ReconnectError::MaxAttemptsExceeded { .. } => true,
            ReconnectError::Conn(err) => err.is_network(),
        }
    }

    /// Returns true when no transport could be established.
    pub fn is_dial(&self) -> bool {
        matches!(
            self,
            ReconnectError::Dial(_) | ReconnectError::MaxAttemptsExceeded { .. }
        )
    }

    /// Returns the server reason for protocol-level failures.
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        match self {
            ReconnectError::Conn(err) => err.protocol_error(),
            _ => None,
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, ReconnectError>;
