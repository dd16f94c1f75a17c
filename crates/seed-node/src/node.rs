//! # Seeder
//!
//! Wires the node key, address book, TCP switch, seed exchange, PEX reactor
//! and HTTP API together.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration, load or generate the node key
//! 2. Load the address book file
//! 3. Resolve seeds, build switch, exchange and reactor
//! 4. Listen for peers, start the reactor, serve HTTP
//! 5. Save the address book periodically
//!
//! Shutdown stops the reactor and switch, then saves the address book.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use seed_pex::adapters::transport::resolve_addresses;
use seed_pex::{
    AddrBook, JsonAddrBookStore, NodeId, PeerListProvider, Reactor, SeedExchange, SeedReactor,
    Switch, SystemTimeSource, TcpSwitch,
};

use crate::config::NodeConfig;
use crate::http;
use crate::identity::NodeKey;

/// Addresses the node ended up bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub p2p: SocketAddr,
    pub api: SocketAddr,
}

/// A running (or ready to run) seed node.
pub struct Seeder {
    config: NodeConfig,
    node_id: NodeId,
    book: Arc<AddrBook>,
    store: JsonAddrBookStore,
    switch: Arc<TcpSwitch>,
    reactor: Arc<SeedReactor>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Seeder {
    /// Build every component. Nothing listens until [`start`](Self::start).
    pub async fn new(config: NodeConfig, home: &Path) -> Result<Self> {
        config.validate()?;

        let key = NodeKey::load_or_generate(&home_path(home, &config.node_key_file))
            .context("failed to load node key")?;
        let node_id = key.node_id();

        let book = Arc::new(AddrBook::new(
            config.addr_book_config(),
            Arc::new(SystemTimeSource),
        ));
        let store = JsonAddrBookStore::new(home_path(home, &config.addr_book_file));
        store.load(&book).context("failed to load address book")?;

        let seeds = resolve_addresses(&config.seeds).await;
        if seeds.is_empty() && book.is_empty() {
            warn!("No seeds configured and the address book is empty");
        }

        let switch = TcpSwitch::new(config.switch_config(), node_id);
        let exchange = Arc::new(SeedExchange::new(
            config.exchange_config(seeds),
            book.clone(),
            switch.clone(),
        ));
        let reactor = Arc::new(SeedReactor::new(
            config.reactor_config(),
            book.clone(),
            switch.clone(),
            exchange,
        )?);
        let as_reactor: Arc<dyn Reactor> = reactor.clone();
        switch.set_reactor(&as_reactor);

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            node_id,
            book,
            store,
            switch,
            reactor,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn address_book(&self) -> &Arc<AddrBook> {
        &self.book
    }

    /// Listen for peers, start the reactor, the HTTP API and the periodic
    /// address book save.
    pub async fn start(&self) -> Result<BoundAddrs> {
        self.log_banner();

        let p2p = self.switch.listen().await.context("failed to listen for peers")?;
        self.book.add_our_address(self.switch.self_address());

        self.reactor.start().context("failed to start reactor")?;

        let listener = TcpListener::bind(self.config.api_addr)
            .await
            .with_context(|| format!("failed to bind API on {}", self.config.api_addr))?;
        let api = listener.local_addr()?;
        let provider: Arc<dyn PeerListProvider> = self.reactor.clone();
        let shutdown = self.shutdown.subscribe();
        let api_task = tokio::spawn(async move {
            if let Err(e) = http::serve(listener, provider, shutdown).await {
                error!(error = %e, "Peer list API failed");
            }
        });
        let save_task = self.store.spawn_periodic_save(
            self.book.clone(),
            self.config.addr_book_save_period(),
            self.shutdown.subscribe(),
        );
        self.tasks.lock().extend([api_task, save_task]);

        info!(p2p = %p2p, api = %api, node_id = %self.node_id, "Seed node started");
        Ok(BoundAddrs { p2p, api })
    }

    /// Stop everything and save the address book.
    pub async fn stop(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");
        self.shutdown.send_replace(true);

        if let Err(e) = self.reactor.stop() {
            warn!(error = %e, "Reactor was not running");
        }
        self.switch.stop();
        self.reactor.wait_for_workers().await;

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for handle in tasks {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        self.store
            .save(&self.book)
            .context("failed to save address book")?;
        info!("Shutdown complete");
        Ok(())
    }

    fn log_banner(&self) {
        let c = &self.config;
        info!("===========================================");
        info!("  Seed Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        info!(node_id = %self.node_id, chain_id = %c.chain_id, moniker = %c.moniker, "Identity");
        info!(listen = %c.listen_addr, api = %c.api_addr, "Addresses");
        info!(
            max_inbound = c.max_inbound_peers,
            max_outbound = c.max_outbound_peers,
            max_frame_size = c.max_frame_size,
            "Connection limits"
        );
        info!(
            peer_queue_size = c.peer_queue_size,
            dial_workers = c.dial_workers,
            strict = c.strict_routability(),
            "Dialing"
        );
        info!(
            known_addresses = self.book.size(),
            seeds = %c.seeds,
            save_period_secs = c.addr_book_save_period_secs,
            "Address book"
        );
    }
}

fn home_path(home: &Path, file: &str) -> PathBuf {
    home.join(file)
}
