//! Address book type definitions.

use super::security::SubnetKey;
use crate::domain::{NetworkAddress, Timestamp};

/// Quality state of a known address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressState {
    /// Learned, never dialed.
    New,
    /// At least one failed dial, never connected.
    Attempted,
    /// Connected successfully; lives in the Tried table.
    Good,
}

impl AddressState {
    /// Lowercase name used in persisted books and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Attempted => "attempted",
            Self::Good => "good",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "attempted" => Some(Self::Attempted),
            "good" => Some(Self::Good),
            _ => None,
        }
    }
}

/// An address entry in the address book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownAddress {
    /// The address itself
    pub addr: NetworkAddress,
    /// Peer that told us about it
    pub source: NetworkAddress,
    /// Current quality state
    pub state: AddressState,
    /// When we first learned about this address
    pub first_seen: Timestamp,
    /// When we last attempted a dial
    pub last_attempt: Option<Timestamp>,
    /// When we last connected successfully
    pub last_success: Option<Timestamp>,
    /// Failed attempts since the last success
    pub attempts: u32,
}

impl KnownAddress {
    /// Create a fresh entry in the `New` state.
    pub fn new(addr: NetworkAddress, source: NetworkAddress, now: Timestamp) -> Self {
        Self {
            addr,
            source,
            state: AddressState::New,
            first_seen: now,
            last_attempt: None,
            last_success: None,
            attempts: 0,
        }
    }

    /// Subnet of the address.
    pub fn subnet(&self) -> SubnetKey {
        SubnetKey::from_ip(&self.addr.ip)
    }

    /// Subnet of the source.
    pub fn source_subnet(&self) -> SubnetKey {
        SubnetKey::from_ip(&self.source.ip)
    }

    /// Staleness key: never-connected and least recently seen sort first.
    pub(crate) fn staleness(&self) -> (u64, u64) {
        (
            self.last_success.map(|t| t.as_secs()).unwrap_or(0),
            self.first_seen.as_secs(),
        )
    }
}

/// Statistics about the address book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddrBookStats {
    /// Addresses in the New table (including attempted ones).
    pub new_count: usize,
    /// Addresses in the New table with at least one failed attempt.
    pub attempted_count: usize,
    /// Addresses in the Tried table.
    pub tried_count: usize,
}

impl AddrBookStats {
    /// Total number of known addresses.
    pub fn total(&self) -> usize {
        self.new_count + self.tried_count
    }
}
