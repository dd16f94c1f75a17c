//! TCP switch: accepts and dials connections, tracks peers, routes
//! messages to the reactor.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::config::SwitchConfig;
use super::error::TransportError;
use super::handshake::{self, NodeInfo};
use super::peer::TcpPeer;
use crate::domain::{DialError, NetworkAddress, NodeId, PexMessage};
use crate::ports::{Envelope, Peer, Reactor, Switch};

/// Connection manager for the peer-exchange channel.
///
/// Created behind an `Arc`; the reactor is attached afterwards with
/// [`set_reactor`](Self::set_reactor) and held weakly.
pub struct TcpSwitch {
    me: Weak<TcpSwitch>,
    config: SwitchConfig,
    node_id: NodeId,
    self_addr: RwLock<NetworkAddress>,
    reactor: RwLock<Option<Weak<dyn Reactor>>>,
    peers: RwLock<HashMap<NodeId, Arc<TcpPeer>>>,
    dialing: Mutex<HashSet<NetworkAddress>>,
    shutdown: watch::Sender<bool>,
    stopped: AtomicBool,
}

impl TcpSwitch {
    pub fn new(config: SwitchConfig, node_id: NodeId) -> Arc<Self> {
        let self_addr = NetworkAddress::from_socket_addr(node_id, config.listen_addr);
        let (shutdown, _) = watch::channel(false);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            node_id,
            self_addr: RwLock::new(self_addr),
            reactor: RwLock::new(None),
            peers: RwLock::new(HashMap::new()),
            dialing: Mutex::new(HashSet::new()),
            shutdown,
            stopped: AtomicBool::new(false),
        })
    }

    /// Route callbacks to `reactor`.
    pub fn set_reactor(&self, reactor: &Arc<dyn Reactor>) {
        *self.reactor.write() = Some(Arc::downgrade(reactor));
    }

    /// This node's id.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The info we send in every handshake.
    pub fn node_info(&self) -> NodeInfo {
        NodeInfo {
            id: self.node_id.to_string(),
            listen_addr: self.self_addr.read().socket_addr().to_string(),
            network: self.config.network.clone(),
            version: self.config.version.clone(),
            moniker: self.config.moniker.clone(),
        }
    }

    /// Bind the listener and start accepting. Returns the bound address.
    pub async fn listen(&self) -> Result<SocketAddr, TransportError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(TransportError::Stopped);
        }
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(TransportError::Bind)?;
        let local = listener.local_addr().map_err(TransportError::Bind)?;
        *self.self_addr.write() = NetworkAddress::from_socket_addr(self.node_id, local);

        let me = self.me.clone();
        let shutdown = self.shutdown.subscribe();
        tokio::spawn(accept_loop(listener, me, shutdown));

        info!(addr = %local, node_id = %self.node_id, "Listening for peers");
        Ok(local)
    }

    /// Close every connection and stop accepting. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.send_replace(true);
        let peers: Vec<Arc<TcpPeer>> = self.peers.write().drain().map(|(_, p)| p).collect();
        for peer in &peers {
            peer.close();
        }
        info!(peers = peers.len(), "Switch stopped");
    }

    /// Connected inbound peers.
    pub fn num_inbound(&self) -> usize {
        self.peers.read().values().filter(|p| !p.is_outbound()).count()
    }

    /// Connected outbound peers.
    pub fn num_outbound(&self) -> usize {
        self.peers.read().values().filter(|p| p.is_outbound()).count()
    }

    fn reactor(&self) -> Option<Arc<dyn Reactor>> {
        self.reactor.read().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn deliver(&self, peer: &Arc<TcpPeer>, message: PexMessage) {
        if let Some(reactor) = self.reactor() {
            reactor.receive(Envelope::new(Arc::clone(peer) as Arc<dyn Peer>, message));
        }
    }

    /// Called by a peer's reader when it exits.
    pub(crate) fn peer_closed(&self, peer: &Arc<TcpPeer>, reason: &str) {
        let removed = {
            let mut peers = self.peers.write();
            match peers.get(&peer.id()) {
                Some(existing) if Arc::ptr_eq(existing, peer) => peers.remove(&peer.id()),
                _ => None,
            }
        };
        if removed.is_some() {
            debug!(peer = %peer.id(), reason, "Peer disconnected");
            if let Some(reactor) = self.reactor() {
                reactor.remove_peer(&**peer, reason);
            }
        }
    }

    async fn handle_inbound(&self, mut stream: TcpStream, remote: SocketAddr) -> Result<(), TransportError> {
        let theirs = handshake::exchange(
            &mut stream,
            &self.node_info(),
            self.config.max_frame_size,
            self.config.handshake_timeout,
        )
        .await?;
        let id = self.node_info().validate_remote(&theirs)?;
        self.register(stream, remote, id, theirs, false)
    }

    async fn connect(&self, addr: &NetworkAddress) -> Result<(), TransportError> {
        let mut stream =
            tokio::time::timeout(self.config.dial_timeout, TcpStream::connect(addr.socket_addr()))
                .await
                .map_err(|_| TransportError::Timeout)?
                .map_err(TransportError::Connect)?;
        let theirs = handshake::exchange(
            &mut stream,
            &self.node_info(),
            self.config.max_frame_size,
            self.config.handshake_timeout,
        )
        .await?;
        let id = self.node_info().validate_remote(&theirs)?;
        if id != addr.id {
            return Err(TransportError::IdMismatch {
                expected: addr.id,
                actual: id,
            });
        }
        self.register(stream, addr.socket_addr(), id, theirs, true)
    }

    fn register(
        &self,
        stream: TcpStream,
        remote: SocketAddr,
        id: NodeId,
        info: NodeInfo,
        outbound: bool,
    ) -> Result<(), TransportError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(TransportError::Stopped);
        }
        let (peer, io) = TcpPeer::new(stream, remote, id, info, outbound, self.config.send_queue_capacity);
        {
            let mut peers = self.peers.write();
            if peers.contains_key(&id) {
                return Err(TransportError::DuplicatePeer(id));
            }
            if !outbound && peers.values().filter(|p| !p.is_outbound()).count() >= self.config.max_inbound {
                return Err(TransportError::LimitReached);
            }
            peers.insert(id, Arc::clone(&peer));
        }

        debug!(peer = %id, addr = %remote, outbound, "Peer connected");
        if let Some(reactor) = self.reactor() {
            reactor.add_peer(Arc::clone(&peer) as Arc<dyn Peer>);
        }
        io.spawn(peer, self.me.clone(), self.config.max_frame_size);
        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, switch: Weak<TcpSwitch>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let (stream, remote) = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            },
        };

        let Some(sw) = switch.upgrade() else {
            break;
        };
        if sw.num_inbound() >= sw.config.max_inbound {
            debug!(addr = %remote, "Inbound limit reached, refusing connection");
            continue;
        }
        tokio::spawn(async move {
            if let Err(e) = sw.handle_inbound(stream, remote).await {
                debug!(addr = %remote, error = %e, "Inbound connection rejected");
            }
        });
    }
    debug!("Accept loop stopped");
}

#[async_trait]
impl Switch for TcpSwitch {
    fn is_dialing_or_existing(&self, addr: &NetworkAddress) -> bool {
        self.dialing.lock().contains(addr) || self.peers.read().contains_key(&addr.id)
    }

    async fn dial(&self, addr: &NetworkAddress) -> Result<(), DialError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(DialError::Stopped);
        }
        if addr.id == self.node_id {
            return Err(DialError::SelfDial);
        }
        if self.num_outbound() >= self.config.max_outbound {
            return Err(TransportError::LimitReached.into());
        }
        if self.peers.read().contains_key(&addr.id) || !self.dialing.lock().insert(*addr) {
            return Err(DialError::AlreadyConnected);
        }

        let result = self.connect(addr).await;
        self.dialing.lock().remove(addr);
        result.map_err(|e| {
            debug!(addr = %addr, error = %e, "Dial failed");
            DialError::from(e)
        })
    }

    fn self_address(&self) -> NetworkAddress {
        *self.self_addr.read()
    }

    fn peers(&self) -> Vec<Arc<dyn Peer>> {
        self.peers
            .read()
            .values()
            .map(|p| Arc::clone(p) as Arc<dyn Peer>)
            .collect()
    }

    fn stop_peer(&self, id: &NodeId, reason: &str) {
        let removed = self.peers.write().remove(id);
        if let Some(peer) = removed {
            debug!(peer = %id, reason, "Stopping peer");
            peer.close();
            if let Some(reactor) = self.reactor() {
                reactor.remove_peer(&*peer, reason);
            }
        }
    }
}
