//! Switch configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for [`TcpSwitch`](super::TcpSwitch)
#[derive(Debug, Clone)]
pub struct SwitchConfig {
    /// Address to bind
    pub listen_addr: SocketAddr,
    /// Chain id; peers on another network are refused
    pub network: String,
    /// Software version sent in the handshake
    pub version: String,
    /// Human-readable node name sent in the handshake
    pub moniker: String,
    /// Maximum inbound connections
    pub max_inbound: usize,
    /// Maximum outbound connections
    pub max_outbound: usize,
    /// TCP connect timeout
    pub dial_timeout: Duration,
    /// Time allowed for the handshake exchange
    pub handshake_timeout: Duration,
    /// Largest accepted frame
    pub max_frame_size: usize,
    /// Messages buffered per peer before sends are refused
    pub send_queue_capacity: usize,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 26656)),
            network: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            moniker: "seed".to_string(),
            max_inbound: 2000,
            max_outbound: 20,
            dial_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(5),
            max_frame_size: 64 * 1024,
            send_queue_capacity: 64,
        }
    }
}

impl SwitchConfig {
    /// Loopback listener on an ephemeral port, short timeouts.
    pub fn for_testing(network: &str) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            network: network.to_string(),
            dial_timeout: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(1),
            ..Self::default()
        }
    }
}
