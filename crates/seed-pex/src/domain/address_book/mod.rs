//! # Address Book - New/Tried Bucket System
//!
//! Known peer addresses with quality state, modelled on Bitcoin's `addrman`.
//!
//! - **New table**: addresses heard about through gossip, possibly with failed
//!   dial attempts (`Attempted`)
//! - **Tried table**: addresses we have connected to (`Good`)
//!
//! New addresses are bucketed by source and address subnet, tried addresses
//! by address subnet, with per-bucket and per-subnet limits so a single IP
//! range cannot flood the book.

mod book;
mod bucket;
mod config;
mod security;
mod table;
mod types;

pub use book::AddrBook;
pub use bucket::AddressBucket;
pub use config::AddrBookConfig;
pub use security::{BucketHasher, SubnetKey};
pub use table::AddressTable;
pub use types::{AddrBookStats, AddressState, KnownAddress};
