//! # Driven Ports (Outbound Dependencies)
//!
//! Interfaces the reactor requires from its collaborators: the address book,
//! the transport switch and its peers, the base peer-exchange behaviour it
//! wraps, and a clock.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    AddressBookError, DialError, ExchangeError, NetworkAddress, NodeId, PexMessage, Timestamp,
};
use crate::ports::inbound::Envelope;

/// Known peer addresses with quality bookkeeping.
///
/// Implementations are internally synchronised; every method takes `&self`.
pub trait AddressBook: Send + Sync {
    /// Record that the peer with this id is reachable.
    fn mark_good(&self, id: &NodeId);

    /// Record a failed dial to this address.
    fn mark_attempt(&self, addr: &NetworkAddress);

    /// Store an address learned from `src`.
    fn add_address(&self, addr: &NetworkAddress, src: &NetworkAddress) -> Result<(), AddressBookError>;

    /// Random sample of known addresses for gossip.
    fn selection(&self) -> Vec<NetworkAddress>;

    /// Number of known addresses.
    fn size(&self) -> usize;

    /// Whether more addresses should be requested from peers.
    fn need_more_addrs(&self) -> bool;

    /// Pick one address to dial, favouring never-connected ones by
    /// `bias_towards_new` percent.
    fn pick_address(&self, bias_towards_new: u8) -> Option<NetworkAddress>;
}

/// The transport's dial capability.
#[async_trait]
pub trait Switch: Send + Sync {
    /// A dial to this address is in progress or a connection already exists.
    fn is_dialing_or_existing(&self, addr: &NetworkAddress) -> bool;

    /// Connect to `addr` and register the peer.
    ///
    /// Bounded by the transport's dial timeout.
    async fn dial(&self, addr: &NetworkAddress) -> Result<(), DialError>;

    /// This node's advertised address.
    fn self_address(&self) -> NetworkAddress;

    /// Currently connected peers.
    fn peers(&self) -> Vec<Arc<dyn Peer>>;

    /// Disconnect a peer.
    fn stop_peer(&self, id: &NodeId, reason: &str);
}

/// An established connection.
pub trait Peer: Send + Sync {
    /// Remote identity.
    fn id(&self) -> NodeId;

    /// Remote socket address, if the connection still has one.
    fn socket_addr(&self) -> Option<SocketAddr>;

    /// The address the remote says it listens on.
    fn listen_addr(&self) -> Option<NetworkAddress>;

    /// We dialed this peer.
    fn is_outbound(&self) -> bool;

    /// Queue a message without blocking. Returns false if it was not queued.
    fn send(&self, message: PexMessage) -> bool;

    /// Time since the connection was established.
    fn connected_for(&self) -> Duration;
}

/// The base peer-exchange behaviour a reactor wraps and delegates to.
pub trait PexProtocol: Send + Sync {
    /// Start background activity. Must be called from within a tokio runtime.
    fn start(&self) -> Result<(), ExchangeError>;

    /// Stop background activity.
    fn stop(&self) -> Result<(), ExchangeError>;

    /// Handle a message the wrapper does not handle itself.
    fn receive(&self, envelope: Envelope);

    /// A peer passed admission.
    fn add_peer(&self, peer: Arc<dyn Peer>);

    /// A peer disconnected.
    fn remove_peer(&self, peer: &dyn Peer, reason: &str);
}

/// Abstract interface for time operations.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}
