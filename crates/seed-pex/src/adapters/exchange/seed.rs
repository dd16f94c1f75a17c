//! Seed-mode peer exchange.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::ExchangeConfig;
use crate::domain::{ExchangeError, NodeId, PexMessage};
use crate::ports::{AddressBook, Envelope, Peer, PexProtocol, Switch};

enum State {
    Idle,
    Running {
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    },
    Stopped,
}

struct Inner {
    config: ExchangeConfig,
    book: Arc<dyn AddressBook>,
    switch: Arc<dyn Switch>,
    last_request: Mutex<HashMap<NodeId, Instant>>,
}

/// Base peer exchange in seed mode.
///
/// Answers each address request with a selection from the book and then
/// disconnects inbound requesters. A background routine dials seeds while
/// the book is empty and otherwise crawls known addresses.
pub struct SeedExchange {
    inner: Arc<Inner>,
    state: Mutex<State>,
}

impl SeedExchange {
    pub fn new(config: ExchangeConfig, book: Arc<dyn AddressBook>, switch: Arc<dyn Switch>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                book,
                switch,
                last_request: Mutex::new(HashMap::new()),
            }),
            state: Mutex::new(State::Idle),
        }
    }

    /// Run one crawl round now.
    pub async fn ensure_peers(&self) {
        self.inner.ensure_peers().await;
    }

    /// Whether the crawl routine is running.
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running { .. })
    }
}

impl Inner {
    fn handle_address_request(&self, src: &dyn Peer) {
        let id = src.id();
        let now = Instant::now();
        {
            let mut last_request = self.last_request.lock();
            if let Some(prev) = last_request.get(&id) {
                if now.duration_since(*prev) < self.config.min_request_interval {
                    warn!(peer = %id, "Address requests too frequent, disconnecting");
                    drop(last_request);
                    self.switch.stop_peer(&id, "too many address requests");
                    return;
                }
            }
            last_request.insert(id, now);
        }

        let addrs = self.book.selection();
        debug!(peer = %id, count = addrs.len(), "Sending address list");
        if !src.send(PexMessage::address_list(&addrs)) {
            debug!(peer = %id, "Failed to queue address list");
        }

        if !src.is_outbound() {
            self.switch.stop_peer(&id, "address request served");
        }
    }

    async fn ensure_peers(&self) {
        let peers = self.switch.peers();
        let outbound: Vec<&Arc<dyn Peer>> = peers.iter().filter(|p| p.is_outbound()).collect();

        let mut disconnected = 0;
        for peer in &outbound {
            if peer.connected_for() >= self.config.outbound_linger {
                debug!(peer = %peer.id(), "Disconnecting crawled peer");
                self.switch.stop_peer(&peer.id(), "crawl complete");
                disconnected += 1;
            }
        }
        let connected_outbound = outbound.len() - disconnected;

        if self.book.size() == 0 {
            self.dial_seeds().await;
        } else {
            let slots = self
                .config
                .max_outbound
                .saturating_sub(connected_outbound)
                .min(self.config.crawl_batch);
            self.crawl(slots).await;
        }

        if self.book.need_more_addrs() {
            for peer in self.switch.peers().iter().filter(|p| p.is_outbound()) {
                peer.send(PexMessage::AddressRequest);
            }
        }
    }

    async fn dial_seeds(&self) {
        if self.config.seeds.is_empty() {
            warn!("Address book is empty and no seeds are configured");
            return;
        }
        info!(seeds = self.config.seeds.len(), "Address book empty, dialing seeds");

        let mut dials = JoinSet::new();
        for seed in &self.config.seeds {
            if self.switch.is_dialing_or_existing(seed) {
                continue;
            }
            let switch = Arc::clone(&self.switch);
            let seed = *seed;
            dials.spawn(async move { (seed, switch.dial(&seed).await) });
        }
        while let Some(joined) = dials.join_next().await {
            match joined {
                Ok((seed, Err(e))) => warn!(seed = %seed, error = %e, "Failed to dial seed"),
                Ok((seed, Ok(()))) => debug!(seed = %seed, "Connected to seed"),
                Err(e) => warn!(error = %e, "Seed dial task failed"),
            }
        }
    }

    async fn crawl(&self, slots: usize) {
        let mut picked = HashSet::new();
        let mut dials = JoinSet::new();

        // A few extra draws cover duplicates and already-connected picks.
        for _ in 0..slots.saturating_mul(3) {
            if picked.len() >= slots {
                break;
            }
            let Some(addr) = self.book.pick_address(self.config.bias_towards_new) else {
                break;
            };
            if !picked.insert(addr) || self.switch.is_dialing_or_existing(&addr) {
                continue;
            }
            let switch = Arc::clone(&self.switch);
            dials.spawn(async move { (addr, switch.dial(&addr).await) });
        }

        if dials.is_empty() {
            return;
        }
        debug!(count = dials.len(), "Crawling addresses");

        while let Some(joined) = dials.join_next().await {
            match joined {
                Ok((addr, Err(e))) if e.is_refusal() => {
                    debug!(addr = %addr, error = %e, "Crawl dial refused by switch");
                }
                Ok((addr, Err(e))) => {
                    debug!(addr = %addr, error = %e, "Crawl dial failed");
                    self.book.mark_attempt(&addr);
                }
                Ok((addr, Ok(()))) => debug!(addr = %addr, "Crawl dial succeeded"),
                Err(e) => warn!(error = %e, "Crawl dial task failed"),
            }
        }
    }
}

async fn ensure_peers_routine(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(inner.config.ensure_peers_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => inner.ensure_peers().await,
        }
    }
    debug!("Ensure-peers routine stopped");
}

impl PexProtocol for SeedExchange {
    fn start(&self) -> Result<(), ExchangeError> {
        let mut state = self.state.lock();
        match *state {
            State::Idle => {}
            State::Running { .. } => return Err(ExchangeError::AlreadyStarted),
            State::Stopped => return Err(ExchangeError::NotRunning),
        }

        let handle = Handle::try_current().map_err(|_| ExchangeError::NoRuntime)?;
        let (shutdown, rx) = watch::channel(false);
        let task = handle.spawn(ensure_peers_routine(Arc::clone(&self.inner), rx));
        *state = State::Running { shutdown, task };
        info!(
            period_secs = self.inner.config.ensure_peers_period.as_secs(),
            seeds = self.inner.config.seeds.len(),
            "Seed exchange started"
        );
        Ok(())
    }

    fn stop(&self) -> Result<(), ExchangeError> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Stopped) {
            State::Running { shutdown, task } => {
                shutdown.send_replace(true);
                drop(task);
                Ok(())
            }
            previous => {
                *state = previous;
                Err(ExchangeError::NotRunning)
            }
        }
    }

    fn receive(&self, envelope: Envelope) {
        match envelope.message {
            PexMessage::AddressRequest => self.inner.handle_address_request(envelope.src.as_ref()),
            ref other => {
                debug!(peer = %envelope.src.id(), kind = other.kind(), "Ignoring message")
            }
        }
    }

    fn add_peer(&self, peer: Arc<dyn Peer>) {
        if peer.is_outbound() {
            if self.inner.book.need_more_addrs() {
                peer.send(PexMessage::AddressRequest);
            }
            return;
        }

        let Some(addr) = peer.listen_addr() else {
            debug!(peer = %peer.id(), "Inbound peer has no listen address");
            return;
        };
        if let Err(e) = self.inner.book.add_address(&addr, &addr) {
            debug!(peer = %peer.id(), error = %e, "Not storing inbound peer address");
        }
    }

    fn remove_peer(&self, peer: &dyn Peer, _reason: &str) {
        self.inner.last_request.lock().remove(&peer.id());
    }
}
