//! # Seed Node Runtime
//!
//! Everything around the peer-exchange reactor that makes it a runnable
//! seed node.
//!
//! - `config` - TOML configuration with defaults and validation
//! - `identity` - ed25519 node key and node id
//! - `logging` - `tracing` subscriber setup
//! - `http` - peer list API
//! - `node` - the `Seeder`, which wires and runs all components

pub mod config;
pub mod http;
pub mod identity;
pub mod logging;
pub mod node;

pub use config::{ConfigError, ConfigOverrides, NodeConfig, CONFIG_FILE};
pub use identity::{IdentityError, NodeKey};
pub use node::{BoundAddrs, Seeder};
