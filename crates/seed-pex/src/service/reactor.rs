//! The seed reactor: a wrapper around a base peer-exchange behaviour that
//! turns received address lists into verified book entries.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{
    decode_addresses, CandidateAddress, NetworkAddress, PexMessage, ReactorConfig, ReactorError,
    WireAddress,
};
use crate::ports::{AddressBook, Envelope, Peer, PeerListProvider, PexProtocol, Reactor, Switch};
use crate::service::dial_queue::{DialQueue, EnqueueOutcome};
use crate::service::workers::{spawn_workers, DialContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Constructed,
    Running,
    Stopped,
}

/// Peer-exchange reactor for seed nodes.
///
/// Address requests go straight to the wrapped base behaviour. Address lists
/// are decoded, queued and dialed by a fixed pool of workers; successful
/// dials are stored in the address book and marked good. Inbound peers are
/// marked good once they pass the routability filter.
///
/// Lifecycle: constructed, running, stopped. Each transition happens once.
pub struct SeedReactor {
    config: ReactorConfig,
    book: Arc<dyn AddressBook>,
    switch: Arc<dyn Switch>,
    base: Arc<dyn PexProtocol>,
    queue: Arc<DialQueue>,
    shutdown_tx: watch::Sender<bool>,
    lifecycle: Mutex<Lifecycle>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SeedReactor {
    /// Build a reactor. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: ReactorConfig,
        book: Arc<dyn AddressBook>,
        switch: Arc<dyn Switch>,
        base: Arc<dyn PexProtocol>,
    ) -> Result<Self, ReactorError> {
        config.validate()?;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            queue: Arc::new(DialQueue::new(config.dial_queue_capacity)),
            config,
            book,
            switch,
            base,
            shutdown_tx,
            lifecycle: Mutex::new(Lifecycle::Constructed),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the dial workers, then start the base behaviour.
    ///
    /// Must be called from within a tokio runtime. If the base fails to
    /// start, the workers are told to stop and the reactor is finished.
    pub fn start(&self) -> Result<(), ReactorError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Constructed => {}
            Lifecycle::Running => return Err(ReactorError::AlreadyStarted),
            Lifecycle::Stopped => return Err(ReactorError::NotRunning),
        }

        let handle = Handle::try_current().map_err(|_| ReactorError::NoRuntime)?;
        let ctx = Arc::new(DialContext::new(
            Arc::clone(&self.book),
            Arc::clone(&self.switch),
            self.config.strict_routability,
        ));
        let handles = spawn_workers(
            &handle,
            self.config.dial_workers,
            Arc::clone(&self.queue),
            ctx,
            self.shutdown_tx.subscribe(),
        );
        *self.workers.lock() = handles;

        if let Err(e) = self.base.start() {
            error!(error = %e, "Base peer exchange failed to start");
            self.shutdown_tx.send_replace(true);
            *lifecycle = Lifecycle::Stopped;
            return Err(ReactorError::BaseStart(e.to_string()));
        }

        *lifecycle = Lifecycle::Running;
        info!(
            workers = self.config.dial_workers,
            queue_capacity = self.config.dial_queue_capacity,
            strict = self.config.strict_routability,
            "Seed reactor started"
        );
        Ok(())
    }

    /// Signal every worker to stop, then stop the base behaviour.
    ///
    /// In-flight dials are not cancelled; use
    /// [`wait_for_workers`](Self::wait_for_workers) to wait for them.
    pub fn stop(&self) -> Result<(), ReactorError> {
        let mut lifecycle = self.lifecycle.lock();
        if *lifecycle != Lifecycle::Running {
            return Err(ReactorError::NotRunning);
        }
        *lifecycle = Lifecycle::Stopped;

        self.shutdown_tx.send_replace(true);
        if let Err(e) = self.base.stop() {
            warn!(error = %e, "Base peer exchange failed to stop cleanly");
        }
        info!(queued = self.queue.len(), "Seed reactor stopped");
        Ok(())
    }

    /// Wait until every worker has exited.
    pub async fn wait_for_workers(&self) {
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Dial worker ended abnormally");
            }
        }
    }

    /// Whether the reactor is running.
    pub fn is_running(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Running
    }

    /// Candidates waiting for a worker.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The configuration the reactor was built with.
    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Addresses the book would currently hand out.
    pub fn peer_selection(&self) -> Vec<NetworkAddress> {
        self.book.selection()
    }

    /// Decode an address list from `src` and queue every entry.
    ///
    /// A malformed entry discards the whole list. Returns how many
    /// candidates were queued.
    pub fn handle_address_list(&self, src: &dyn Peer, addrs: &[WireAddress]) -> usize {
        let decoded = match decode_addresses(addrs) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!(peer = %src.id(), error = %e, "Failed to decode received addresses");
                return 0;
            }
        };

        let source = src
            .socket_addr()
            .map(|sa| NetworkAddress::from_socket_addr(src.id(), sa));

        let mut enqueued = 0;
        for addr in decoded {
            debug!(addr = %addr, peer = %src.id(), "Received peer address");
            match self.queue.try_enqueue(CandidateAddress::new(addr, source)) {
                EnqueueOutcome::Enqueued => enqueued += 1,
                EnqueueOutcome::Dropped => {
                    warn!(addr = %addr, "Dial queue full, dropping address");
                }
            }
        }
        enqueued
    }
}

impl Reactor for SeedReactor {
    fn receive(&self, envelope: Envelope) {
        debug!(peer = %envelope.src.id(), kind = envelope.message.kind(), "Received pex message");
        match envelope.message {
            PexMessage::AddressRequest => self.base.receive(envelope),
            PexMessage::AddressList { ref addrs } => {
                self.handle_address_list(envelope.src.as_ref(), addrs);
            }
            PexMessage::Unknown => {
                warn!(peer = %envelope.src.id(), "Received unknown pex message type");
            }
        }
    }

    fn add_peer(&self, peer: Arc<dyn Peer>) {
        let Some(socket_addr) = peer.socket_addr() else {
            warn!(peer = %peer.id(), "Not adding peer: no address");
            return;
        };
        let addr = NetworkAddress::from_socket_addr(peer.id(), socket_addr);
        if self.config.strict_routability && !addr.routable() {
            warn!(peer = %peer.id(), addr = %addr, "Not adding peer: address not routable");
            return;
        }

        info!(peer = %peer.id(), addr = %addr, "Adding peer, marking good");
        self.book.mark_good(&addr.id);
        self.base.add_peer(peer);
    }

    fn remove_peer(&self, peer: &dyn Peer, reason: &str) {
        self.base.remove_peer(peer, reason);
    }
}

impl PeerListProvider for SeedReactor {
    fn peer_selection(&self) -> Vec<NetworkAddress> {
        SeedReactor::peer_selection(self)
    }
}
