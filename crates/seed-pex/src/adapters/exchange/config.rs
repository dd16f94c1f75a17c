//! Seed exchange configuration.

use std::time::Duration;

use crate::domain::NetworkAddress;

/// Configuration for [`SeedExchange`](super::SeedExchange)
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Dialed when the address book is empty
    pub seeds: Vec<NetworkAddress>,
    /// Interval between crawl rounds
    pub ensure_peers_period: Duration,
    /// Address requests from one peer closer together than this are abuse
    pub min_request_interval: Duration,
    /// Upper bound on outbound connections
    pub max_outbound: usize,
    /// Addresses dialed per crawl round
    pub crawl_batch: usize,
    /// Chance (percent) of crawling a never-connected address
    pub bias_towards_new: u8,
    /// Outbound peers connected longer than this are disconnected
    pub outbound_linger: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        let ensure_peers_period = Duration::from_secs(30);
        Self {
            seeds: Vec::new(),
            ensure_peers_period,
            min_request_interval: ensure_peers_period / 3,
            max_outbound: 20,
            crawl_batch: 10,
            bias_towards_new: 30,
            outbound_linger: Duration::from_secs(180),
        }
    }
}

impl ExchangeConfig {
    /// Default settings with the given seeds.
    pub fn with_seeds(seeds: Vec<NetworkAddress>) -> Self {
        Self {
            seeds,
            ..Self::default()
        }
    }
}
