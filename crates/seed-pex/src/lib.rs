//! # Seed Peer Exchange
//!
//! Peer-exchange (PEX) reactor for seed nodes. A seed node's job is to
//! learn as many peer addresses as possible and hand them out: every
//! address a peer gossips is queued, dialed by a worker pool, and stored
//! only after the dial succeeds.
//!
//! ## Architecture
//!
//! Hexagonal, as in every subsystem of this workspace:
//! - **Domain Layer:** node ids, addresses, routability, PEX messages and
//!   the New/Tried address book
//! - **Ports Layer:** `Reactor` (driven by the transport), `AddressBook`,
//!   `Switch`, `Peer`, `PexProtocol`, `TimeSource`
//! - **Service Layer:** `SeedReactor`, the bounded `DialQueue` and the dial
//!   workers
//! - **Adapters Layer:** the seed-mode base exchange, a system clock and,
//!   behind the `network` feature, the TCP switch and JSON book persistence
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use seed_pex::{AddrBook, AddrBookConfig, NetworkAddress, SystemTimeSource};
//!
//! let book = AddrBook::new(AddrBookConfig::default(), Arc::new(SystemTimeSource));
//! let addr: NetworkAddress = "0101010101010101010101010101010101010101@8.8.8.8:26656"
//!     .parse()
//!     .unwrap();
//!
//! assert!(addr.routable());
//! book.add(&addr, &addr).unwrap();
//! assert_eq!(book.size(), 1);
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod domain;
pub mod ports;
pub mod service;

/// Base exchange, clock, and (with `network`) transport and persistence.
pub mod adapters;

/// Recording mocks and fixtures.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// =============================================================================
// RE-EXPORTS
// =============================================================================

// Domain
pub use domain::{
    is_local, is_routable, AddrBook, AddrBookConfig, AddrBookStats, AddressBookError,
    AddressParseError, AddressState, CandidateAddress, DecodeError, DialError, ExchangeError,
    KnownAddress, NetworkAddress, NodeId, PexMessage, ReactorConfig, ReactorError, Timestamp,
    WireAddress,
};

// Ports
pub use ports::{AddressBook, Envelope, Peer, PeerListProvider, PexProtocol, Reactor, Switch, TimeSource};

// Service
pub use service::{DialQueue, EnqueueOutcome, SeedReactor};

// Adapters
pub use adapters::{ExchangeConfig, SeedExchange, SystemTimeSource};

#[cfg(feature = "network")]
pub use adapters::{JsonAddrBookStore, PersistenceError, SwitchConfig, TcpSwitch, TransportError};
