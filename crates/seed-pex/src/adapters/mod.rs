//! # Adapters
//!
//! Concrete implementations of the ports.
//!
//! - `exchange` - seed-mode base peer exchange (always available)
//! - `time` - system clock
//! - `persistence` - JSON address book file (requires "network" feature)
//! - `transport` - TCP switch and peers (requires "network" feature)

pub mod exchange;
pub mod time;

#[cfg(feature = "network")]
pub mod persistence;

#[cfg(feature = "network")]
pub mod transport;

pub use exchange::{ExchangeConfig, SeedExchange};
pub use time::SystemTimeSource;

#[cfg(feature = "network")]
pub use persistence::{JsonAddrBookStore, PersistenceError};

#[cfg(feature = "network")]
pub use transport::{resolve_address, NodeInfo, SwitchConfig, TcpPeer, TcpSwitch, TransportError};
