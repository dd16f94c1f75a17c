//! Domain Errors for Peer Exchange

use thiserror::Error;

use super::entities::{NetworkAddress, NodeId};

/// Errors parsing a textual or wire-encoded address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address {0:?} is missing the `id@` prefix")]
    MissingId(String),

    #[error("invalid node id {0:?}")]
    InvalidId(String),

    #[error("invalid host {0:?}")]
    InvalidHost(String),

    #[error("invalid port {0}")]
    InvalidPort(u32),
}

/// An address-list payload that could not be decoded.
///
/// The whole message is rejected; no address from it is used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("address {index} in list is malformed: {source}")]
pub struct DecodeError {
    /// Position of the first bad entry.
    pub index: usize,
    /// What was wrong with it.
    #[source]
    pub source: AddressParseError,
}

/// Reasons the address book refuses an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressBookError {
    #[error("address {0} is not routable")]
    NonRoutable(NetworkAddress),

    #[error("address {0} is invalid")]
    Invalid(NetworkAddress),

    #[error("address {0} belongs to this node")]
    SelfAddress(NetworkAddress),

    #[error("too many addresses from the subnet of {0}")]
    SubnetLimitReached(NetworkAddress),
}

/// Outcome of a failed outbound dial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialError {
    #[error("dial timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("expected node {expected}, got {actual}")]
    IdMismatch { expected: NodeId, actual: NodeId },

    #[error("refusing to dial ourselves")]
    SelfDial,

    #[error("already dialing or connected")]
    AlreadyConnected,

    #[error("outbound connection limit reached")]
    LimitReached,

    #[error("switch is stopped")]
    Stopped,
}

impl DialError {
    /// The switch turned the dial down without contacting the remote.
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::AlreadyConnected | Self::LimitReached | Self::Stopped)
    }
}

/// Reactor construction and lifecycle errors.
///
/// These are the only errors surfaced to the caller; per-address failures
/// stay inside the handler and workers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactorError {
    #[error("invalid reactor config: {0}")]
    InvalidConfig(String),

    #[error("already started")]
    AlreadyStarted,

    #[error("not running")]
    NotRunning,

    #[error("no tokio runtime available to spawn tasks")]
    NoRuntime,

    #[error("base peer exchange failed to start: {0}")]
    BaseStart(String),
}

/// Errors from the base peer-exchange behaviour's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    #[error("peer exchange already started")]
    AlreadyStarted,

    #[error("peer exchange not running")]
    NotRunning,

    #[error("no tokio runtime available to spawn tasks")]
    NoRuntime,
}
