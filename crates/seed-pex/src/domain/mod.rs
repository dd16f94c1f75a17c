//! Domain Layer - Pure peer-exchange logic with no I/O
//!
//! - Node identifiers and network addresses with a routability predicate
//! - Peer-exchange messages and all-or-nothing address-list decoding
//! - Address Book (New/Tried bucket system - Bitcoin addrman)
//! - Reactor configuration and error types

pub mod address_book;
pub mod config;
pub mod entities;
pub mod errors;
pub mod messages;
pub mod routability;

pub use address_book::*;
pub use config::*;
pub use entities::*;
pub use errors::*;
pub use messages::*;
pub use routability::{is_local, is_routable};
