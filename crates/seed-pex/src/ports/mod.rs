//! Ports Layer - Hexagonal Architecture interfaces
//!
//! - `inbound` (Driving Ports): what the transport calls on the reactor
//! - `outbound` (Driven Ports): what the reactor needs from its collaborators

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
