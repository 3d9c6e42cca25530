//! Error types for the protocol connection.

use std::io;

/// A well-formed negative reply from the server, or a reply the client
/// could not make sense of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// `BAD_FORMAT`
    #[error("bad command format")]
    BadFormat,
    /// `BURIED`: the job was buried instead of being released or inserted.
    #[error("buried")]
    Buried,
    /// `DEADLINE_SOON`: a reserved job's TTR is about to expire.
    #[error("deadline soon")]
    DeadlineSoon,
    /// `DRAINING`: the server is not accepting new jobs.
    #[error("draining")]
    Draining,
    /// `EXPECTED_CRLF`
    #[error("expected CR LF")]
    ExpectedCrlf,
    /// `INTERNAL_ERROR`
    #[error("internal error")]
    Internal,
    /// `JOB_TOO_BIG`
    #[error("job too big")]
    JobTooBig,
    /// `NOT_FOUND`
    #[error("not found")]
    NotFound,
    /// `NOT_IGNORED`: attempt to ignore the only watched tube.
    #[error("not ignored")]
    NotIgnored,
    /// `OUT_OF_MEMORY`
    #[error("server is out of memory")]
    OutOfMemory,
    /// `TIMED_OUT`: no job became ready within a reserve timeout.
    #[error("timeout")]
    TimedOut,
    /// `UNKNOWN_COMMAND`
    #[error("unknown command")]
    UnknownCommand,
    /// The reply did not match the grammar of the issued command.
    #[error("bad reply from server")]
    BadReply,
}

impl ProtocolError {
    /// Maps the first word of a server reply to its error, if it names one.
    pub fn from_reply(word: &str) -> Option<Self> {
        let err = match word {
            "BAD_FORMAT" => Self::BadFormat,
            "BURIED" => Self::Buried,
            "DEADLINE_SOON" => Self::DeadlineSoon,
            "DRAINING" => Self::Draining,
            "EXPECTED_CRLF" => Self::ExpectedCrlf,
            "INTERNAL_ERROR" => Self::Internal,
            "JOB_TOO_BIG" => Self::JobTooBig,
            "NOT_FOUND" => Self::NotFound,
            "NOT_IGNORED" => Self::NotIgnored,
            "OUT_OF_MEMORY" => Self::OutOfMemory,
            "TIMED_OUT" => Self::TimedOut,
            "UNKNOWN_COMMAND" => Self::UnknownCommand,
            _ => return None,
        };
        Some(err)
    }
}

/// Errors returned by [`Conn`](crate::Conn).
///
/// The split between [`Error::Network`] and everything else is what the
/// session layer keys its redial decision on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed (reset, broken pipe, EOF, socket timeout).
    #[error("{op}: {source}")]
    Network {
        /// Command being executed.
        op: &'static str,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The server answered with a negative reply.
    #[error("{op}: {reason}")]
    Protocol {
        /// Command being executed.
        op: &'static str,
        /// Server-defined reason.
        reason: ProtocolError,
    },

    /// A tube name was rejected before anything was sent.
    #[error("invalid tube name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl Error {
    /// Returns true for transport failures, which a fresh connection may cure.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }

    /// Returns the server reason for protocol-level failures.
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        match self {
            Error::Protocol { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn network(op: &'static str, source: io::Error) -> Self {
        Error::Network { op, source }
    }

    pub(crate) fn protocol(op: &'static str, reason: ProtocolError) -> Self {
        Error::Protocol { op, reason }
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;
