//! Client error types.

use bytes::Bytes;
use irbis_protocol::ProtocolError;
use thiserror::Error;

/// Raw wire buffers attached to a failed command, so failures can be
/// analyzed offline without reproducing network timing.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    /// The encoded outgoing packet, if it was built.
    pub request: Option<Bytes>,
    /// The raw incoming packet, if one was received.
    pub response: Option<Bytes>,
}

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("{0} not set before dispatch")]
    Misconfigured(&'static str),

    /// A command failed inside the execution engine. Carries the verb and
    /// the raw wire buffers as diagnostic evidence.
    #[error("command {verb:?} failed: {source}")]
    Command {
        verb: String,
        evidence: Evidence,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Returns the rejected server status code, if that is what failed,
    /// unwrapping any engine wrapper.
    pub fn status(&self) -> Option<i32> {
        match self {
            ClientError::Protocol(err) => err.status(),
            ClientError::Command { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns the attached wire evidence, if any.
    pub fn evidence(&self) -> Option<&Evidence> {
        match self {
            ClientError::Command { evidence, .. } => Some(evidence),
            _ => None,
        }
    }
}
