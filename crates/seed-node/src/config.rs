//! # Node Configuration
//!
//! `config.toml` in the home directory. A missing file means defaults; the
//! file is written back on every start so it lists every setting.
//! Command-line and environment overrides apply to the running node only.

use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use seed_pex::{AddrBookConfig, ExchangeConfig, NetworkAddress, ReactorConfig, SwitchConfig};

/// File name of the configuration inside the home directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete seed node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node key, relative to the home directory.
    pub node_key_file: String,
    /// Address book, relative to the home directory.
    pub addr_book_file: String,
    /// P2P listen address.
    pub listen_addr: SocketAddr,
    /// Default log filter; `RUST_LOG` takes precedence.
    pub log_level: String,
    pub max_inbound_peers: usize,
    pub max_outbound_peers: usize,
    /// Largest accepted wire frame in bytes.
    pub max_frame_size: usize,
    /// Accept and dial private, loopback and reserved addresses.
    pub allow_non_routable: bool,
    /// Dial queue capacity.
    pub peer_queue_size: usize,
    pub dial_workers: usize,
    /// Network (chain id) to join. Required.
    pub chain_id: String,
    /// Comma separated `id@host:port` seeds.
    pub seeds: String,
    /// HTTP listen address for the peer list.
    pub api_addr: SocketAddr,
    pub dial_timeout_secs: u64,
    pub ensure_peers_period_secs: u64,
    /// How often the address book is written to disk while running.
    pub addr_book_save_period_secs: u64,
    /// Name sent in the handshake.
    pub moniker: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_key_file: "node_key.json".to_string(),
            addr_book_file: "addrbook.json".to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 26656)),
            log_level: "info".to_string(),
            max_inbound_peers: 2000,
            max_outbound_peers: 20,
            max_frame_size: 64 * 1024,
            allow_non_routable: false,
            peer_queue_size: 1000,
            dial_workers: 20,
            chain_id: String::new(),
            seeds: String::new(),
            api_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            dial_timeout_secs: 3,
            ensure_peers_period_secs: 30,
            addr_book_save_period_secs: 120,
            moniker: "seed-node".to_string(),
        }
    }
}

/// Settings taken from flags or the environment. Never written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub chain_id: Option<String>,
    pub seeds: Option<String>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut NodeConfig) {
        if let Some(chain_id) = self.chain_id {
            config.chain_id = chain_id;
        }
        if let Some(seeds) = self.seeds {
            config.seeds = seeds;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
    }
}

impl NodeConfig {
    /// Load `path` (defaults if missing), write it back, then apply
    /// `overrides` to the returned copy only.
    pub fn load_with_overrides(path: &Path, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(path)?;
        config.save(path)?;
        overrides.apply(&mut config);
        Ok(config)
    }

    /// Read `path`, or return defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, raw).map_err(io_err)
    }

    /// Reject configurations the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::Invalid("chain_id is required".into()));
        }
        if self.dial_workers == 0 {
            return Err(ConfigError::Invalid("dial_workers must be greater than 0".into()));
        }
        if self.peer_queue_size == 0 {
            return Err(ConfigError::Invalid("peer_queue_size must be greater than 0".into()));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid("max_frame_size must be greater than 0".into()));
        }
        if self.addr_book_save_period_secs == 0 {
            return Err(ConfigError::Invalid(
                "addr_book_save_period_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn strict_routability(&self) -> bool {
        !self.allow_non_routable
    }

    pub fn reactor_config(&self) -> ReactorConfig {
        ReactorConfig {
            dial_queue_capacity: self.peer_queue_size,
            dial_workers: self.dial_workers,
            strict_routability: self.strict_routability(),
        }
    }

    pub fn addr_book_config(&self) -> AddrBookConfig {
        AddrBookConfig::with_strict(self.strict_routability())
    }

    pub fn switch_config(&self) -> SwitchConfig {
        SwitchConfig {
            listen_addr: self.listen_addr,
            network: self.chain_id.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            moniker: self.moniker.clone(),
            max_inbound: self.max_inbound_peers,
            max_outbound: self.max_outbound_peers,
            dial_timeout: Duration::from_secs(self.dial_timeout_secs),
            max_frame_size: self.max_frame_size,
            ..SwitchConfig::default()
        }
    }

    pub fn addr_book_save_period(&self) -> Duration {
        Duration::from_secs(self.addr_book_save_period_secs)
    }

    pub fn exchange_config(&self, seeds: Vec<NetworkAddress>) -> ExchangeConfig {
        let ensure_peers_period = Duration::from_secs(self.ensure_peers_period_secs.max(1));
        ExchangeConfig {
            seeds,
            ensure_peers_period,
            min_request_interval: ensure_peers_period / 3,
            max_outbound: self.max_outbound_peers,
            ..ExchangeConfig::default()
        }
    }
}
