//! Centralized Testing Utilities
//!
//! Recording mocks for every outbound port plus address fixtures.
//! Available with the `test-utils` feature flag.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{
    AddressBookError, DialError, ExchangeError, NetworkAddress, NodeId, PexMessage, Timestamp,
};
use crate::ports::{AddressBook, Envelope, Peer, PexProtocol, Switch, TimeSource};

// =============================================================================
// FIXTURES
// =============================================================================

/// Deterministic node id whose first and last bytes are `n`.
pub fn node_id(n: u8) -> NodeId {
    let mut id = [0u8; 20];
    id[0] = n;
    id[19] = n;
    NodeId::new(id)
}

/// A public address, `n.n.n.n:26656` shifted out of reserved ranges.
pub fn routable_addr(n: u8) -> NetworkAddress {
    NetworkAddress::new(node_id(n), IpAddr::V4(Ipv4Addr::new(8, 8, n, n)), 26656)
}

/// A private (RFC 1918) address.
pub fn private_addr(n: u8) -> NetworkAddress {
    NetworkAddress::new(node_id(n), IpAddr::V4(Ipv4Addr::new(192, 168, 0, n)), 26656)
}

// =============================================================================
// TIME
// =============================================================================

/// A time source that returns a settable timestamp.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    timestamp: AtomicU64,
}

impl FixedTimeSource {
    /// Create a new fixed time source with the given timestamp (in seconds).
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp: AtomicU64::new(timestamp),
        }
    }

    /// Move time forward.
    pub fn advance(&self, secs: u64) {
        self.timestamp.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.timestamp.load(Ordering::SeqCst))
    }
}

// =============================================================================
// ADDRESS BOOK
// =============================================================================

/// One call made on a [`RecordingAddressBook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookCall {
    MarkGood(NodeId),
    MarkAttempt(NetworkAddress),
    AddAddress {
        addr: NetworkAddress,
        src: NetworkAddress,
    },
}

/// Address book that records every mutating call in order.
#[derive(Debug, Default)]
pub struct RecordingAddressBook {
    calls: Mutex<Vec<BookCall>>,
    fail_add: AtomicBool,
    selection: Mutex<Vec<NetworkAddress>>,
    picks: Mutex<VecDeque<NetworkAddress>>,
    need_more: AtomicBool,
}

impl RecordingAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<BookCall> {
        self.calls.lock().clone()
    }

    /// Make `add_address` fail from now on.
    pub fn fail_add_address(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    /// What `selection` returns.
    pub fn set_selection(&self, addrs: Vec<NetworkAddress>) {
        *self.selection.lock() = addrs;
    }

    /// Queue an address for `pick_address`.
    pub fn push_pick(&self, addr: NetworkAddress) {
        self.picks.lock().push_back(addr);
    }

    /// What `need_more_addrs` returns.
    pub fn set_need_more(&self, need: bool) {
        self.need_more.store(need, Ordering::SeqCst);
    }

    pub fn mark_good_count(&self) -> usize {
        self.count(|c| matches!(c, BookCall::MarkGood(_)))
    }

    pub fn mark_attempt_count(&self) -> usize {
        self.count(|c| matches!(c, BookCall::MarkAttempt(_)))
    }

    pub fn add_address_count(&self) -> usize {
        self.count(|c| matches!(c, BookCall::AddAddress { .. }))
    }

    fn count(&self, pred: impl Fn(&BookCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }
}

impl AddressBook for RecordingAddressBook {
    fn mark_good(&self, id: &NodeId) {
        self.calls.lock().push(BookCall::MarkGood(*id));
    }

    fn mark_attempt(&self, addr: &NetworkAddress) {
        self.calls.lock().push(BookCall::MarkAttempt(*addr));
    }

    fn add_address(&self, addr: &NetworkAddress, src: &NetworkAddress) -> Result<(), AddressBookError> {
        self.calls.lock().push(BookCall::AddAddress {
            addr: *addr,
            src: *src,
        });
        if self.fail_add.load(Ordering::SeqCst) {
            Err(AddressBookError::Invalid(*addr))
        } else {
            Ok(())
        }
    }

    fn selection(&self) -> Vec<NetworkAddress> {
        self.selection.lock().clone()
    }

    fn size(&self) -> usize {
        self.selection.lock().len()
    }

    fn need_more_addrs(&self) -> bool {
        self.need_more.load(Ordering::SeqCst)
    }

    fn pick_address(&self, _bias_towards_new: u8) -> Option<NetworkAddress> {
        self.picks.lock().pop_front()
    }
}

// =============================================================================
// SWITCH
// =============================================================================

/// Switch double with scripted dial results.
///
/// An address counts as "dialing or existing" from the moment a dial starts;
/// failed dials clear it again.
pub struct MockSwitch {
    self_addr: NetworkAddress,
    existing: Mutex<HashSet<NetworkAddress>>,
    failing: Mutex<HashSet<NetworkAddress>>,
    refusing: Mutex<HashMap<NetworkAddress, DialError>>,
    dialed: Mutex<Vec<NetworkAddress>>,
    peers: Mutex<Vec<Arc<dyn Peer>>>,
    stopped: Mutex<Vec<(NodeId, String)>>,
    dial_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
}

impl MockSwitch {
    pub fn new(self_addr: NetworkAddress) -> Self {
        Self {
            self_addr,
            existing: Mutex::new(HashSet::new()),
            failing: Mutex::new(HashSet::new()),
            refusing: Mutex::new(HashMap::new()),
            dialed: Mutex::new(Vec::new()),
            peers: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            dial_delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Pretend a connection to `addr` already exists.
    pub fn mark_existing(&self, addr: NetworkAddress) {
        self.existing.lock().insert(addr);
    }

    /// Make dials to `addr` fail.
    pub fn fail_dials_to(&self, addr: NetworkAddress) {
        self.failing.lock().insert(addr);
    }

    /// Make dials to `addr` return `err` immediately, as a switch does when
    /// it declines to open a connection.
    pub fn refuse_dials_to(&self, addr: NetworkAddress, err: DialError) {
        self.refusing.lock().insert(addr, err);
    }

    /// Every dial takes this long.
    pub fn set_dial_delay(&self, delay: Duration) {
        *self.dial_delay.lock() = delay;
    }

    /// Register a connected peer.
    pub fn add_peer(&self, peer: Arc<dyn Peer>) {
        self.peers.lock().push(peer);
    }

    /// Addresses dialed so far, in order.
    pub fn dialed(&self) -> Vec<NetworkAddress> {
        self.dialed.lock().clone()
    }

    pub fn dial_count(&self) -> usize {
        self.dialed.lock().len()
    }

    /// Dials currently in progress.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Peers disconnected through `stop_peer`, with reasons.
    pub fn stopped_peers(&self) -> Vec<(NodeId, String)> {
        self.stopped.lock().clone()
    }
}

#[async_trait]
impl Switch for MockSwitch {
    fn is_dialing_or_existing(&self, addr: &NetworkAddress) -> bool {
        self.existing.lock().contains(addr)
    }

    async fn dial(&self, addr: &NetworkAddress) -> Result<(), DialError> {
        self.dialed.lock().push(*addr);
        if let Some(err) = self.refusing.lock().get(addr) {
            return Err(err.clone());
        }
        self.existing.lock().insert(*addr);
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let delay = *self.dial_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().contains(addr) {
            self.existing.lock().remove(addr);
            return Err(DialError::Connection("connection refused".into()));
        }
        Ok(())
    }

    fn self_address(&self) -> NetworkAddress {
        self.self_addr
    }

    fn peers(&self) -> Vec<Arc<dyn Peer>> {
        self.peers.lock().clone()
    }

    fn stop_peer(&self, id: &NodeId, reason: &str) {
        self.peers.lock().retain(|p| &p.id() != id);
        self.stopped.lock().push((*id, reason.to_string()));
    }
}

// =============================================================================
// PEER
// =============================================================================

/// Connected peer double that records sent messages.
#[derive(Debug)]
pub struct MockPeer {
    id: NodeId,
    socket_addr: Option<SocketAddr>,
    listen_addr: Option<NetworkAddress>,
    outbound: bool,
    connected_for: Duration,
    sent: Mutex<Vec<PexMessage>>,
}

impl MockPeer {
    /// An inbound peer connecting from (and listening on) `addr`.
    pub fn inbound(addr: NetworkAddress) -> Self {
        Self {
            id: addr.id,
            socket_addr: Some(addr.socket_addr()),
            listen_addr: Some(addr),
            outbound: false,
            connected_for: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A peer we dialed at `addr`.
    pub fn outbound(addr: NetworkAddress) -> Self {
        Self {
            outbound: true,
            ..Self::inbound(addr)
        }
    }

    /// A peer whose connection has no socket address.
    pub fn without_address(id: NodeId) -> Self {
        Self {
            id,
            socket_addr: None,
            listen_addr: None,
            outbound: false,
            connected_for: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Pretend the connection has been up this long.
    pub fn with_connected_for(mut self, duration: Duration) -> Self {
        self.connected_for = duration;
        self
    }

    /// Messages sent to this peer, in order.
    pub fn sent(&self) -> Vec<PexMessage> {
        self.sent.lock().clone()
    }
}

impl Peer for MockPeer {
    fn id(&self) -> NodeId {
        self.id
    }

    fn socket_addr(&self) -> Option<SocketAddr> {
        self.socket_addr
    }

    fn listen_addr(&self) -> Option<NetworkAddress> {
        self.listen_addr
    }

    fn is_outbound(&self) -> bool {
        self.outbound
    }

    fn send(&self, message: PexMessage) -> bool {
        self.sent.lock().push(message);
        true
    }

    fn connected_for(&self) -> Duration {
        self.connected_for
    }
}

// =============================================================================
// BASE EXCHANGE
// =============================================================================

/// Base behaviour double that records delegated calls.
#[derive(Debug, Default)]
pub struct MockExchange {
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
    received: Mutex<Vec<(NodeId, PexMessage)>>,
    added: Mutex<Vec<NodeId>>,
    removed: Mutex<Vec<NodeId>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `start` fail.
    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Messages delegated by the reactor.
    pub fn received(&self) -> Vec<(NodeId, PexMessage)> {
        self.received.lock().clone()
    }

    /// Peers passed through admission.
    pub fn added(&self) -> Vec<NodeId> {
        self.added.lock().clone()
    }

    pub fn removed(&self) -> Vec<NodeId> {
        self.removed.lock().clone()
    }
}

impl PexProtocol for MockExchange {
    fn start(&self) -> Result<(), ExchangeError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ExchangeError::NoRuntime);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), ExchangeError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn receive(&self, envelope: Envelope) {
        self.received
            .lock()
            .push((envelope.src.id(), envelope.message));
    }

    fn add_peer(&self, peer: Arc<dyn Peer>) {
        self.added.lock().push(peer.id());
    }

    fn remove_peer(&self, peer: &dyn Peer, _reason: &str) {
        self.removed.lock().push(peer.id());
    }
}
