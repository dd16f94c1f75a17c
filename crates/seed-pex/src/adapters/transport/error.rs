use thiserror::Error;

use super::codec::FrameError;
use crate::domain::{AddressParseError, DialError, NodeId};

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("timed out")]
    Timeout,

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),

    #[error("peer is on network {theirs:?}, we are on {ours:?}")]
    NetworkMismatch { ours: String, theirs: String },

    #[error("expected node {expected}, got {actual}")]
    IdMismatch { expected: NodeId, actual: NodeId },

    #[error("connected to ourselves")]
    SelfConnection,

    #[error("already connected to {0}")]
    DuplicatePeer(NodeId),

    #[error("connection limit reached")]
    LimitReached,

    #[error("could not resolve {0}")]
    Resolve(String),

    #[error("invalid address: {0}")]
    Address(#[from] AddressParseError),

    #[error("switch is stopped")]
    Stopped,
}

impl From<TransportError> for DialError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => DialError::Timeout,
            TransportError::IdMismatch { expected, actual } => DialError::IdMismatch { expected, actual },
            TransportError::SelfConnection => DialError::SelfDial,
            TransportError::DuplicatePeer(_) => DialError::AlreadyConnected,
            TransportError::Stopped => DialError::Stopped,
            TransportError::Connect(e) => DialError::Connection(e.to_string()),
            TransportError::LimitReached => DialError::LimitReached,
            other => DialError::Handshake(other.to_string()),
        }
    }
}
