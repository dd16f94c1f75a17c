//! # TCP Transport
//!
//! A minimal switch for the peer-exchange channel:
//!
//! - `codec` - u32 big-endian length-prefixed JSON frames
//! - `handshake` - `NodeInfo` exchange and validation
//! - `peer` - one connection with a bounded send queue, a writer and a reader task
//! - `switch` - listener, dialer, peer registry and limits

mod codec;
mod config;
mod error;
mod handshake;
mod peer;
mod resolve;
mod switch;

pub use codec::{read_frame, write_frame, FrameError};
pub use config::SwitchConfig;
pub use error::TransportError;
pub use handshake::NodeInfo;
pub use peer::TcpPeer;
pub use resolve::{resolve_address, resolve_addresses};
pub use switch::TcpSwitch;
