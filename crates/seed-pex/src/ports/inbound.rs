//! # Driving Ports (Inbound API)
//!
//! What the transport and the HTTP surface call on the peer-exchange layer.

use std::fmt;
use std::sync::Arc;

use crate::domain::{NetworkAddress, PexMessage};
use crate::ports::outbound::Peer;

/// A message received from a connected peer.
#[derive(Clone)]
pub struct Envelope {
    /// The peer that sent the message.
    pub src: Arc<dyn Peer>,
    /// The decoded message.
    pub message: PexMessage,
}

impl Envelope {
    /// Wrap a message from `src`.
    pub fn new(src: Arc<dyn Peer>, message: PexMessage) -> Self {
        Self { src, message }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("src", &self.src.id())
            .field("message", &self.message)
            .finish()
    }
}

/// Callbacks the transport drives for every connected peer.
///
/// Calls may arrive concurrently from many connection tasks.
pub trait Reactor: Send + Sync {
    /// Handle a message from a peer.
    fn receive(&self, envelope: Envelope);

    /// A connection completed its handshake.
    fn add_peer(&self, peer: Arc<dyn Peer>);

    /// A connection closed.
    fn remove_peer(&self, peer: &dyn Peer, reason: &str);
}

/// Read-only view of the addresses this node would hand out.
pub trait PeerListProvider: Send + Sync {
    /// Current selection from the address book.
    fn peer_selection(&self) -> Vec<NetworkAddress>;
}
