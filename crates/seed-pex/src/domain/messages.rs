//! Peer-exchange messages.
//!
//! Addresses travel in an unvalidated wire form and are decoded as a whole:
//! a single malformed entry rejects the entire list.

use std::fmt;
use std::net::IpAddr;

#[cfg(feature = "network")]
use serde::{Deserialize, Serialize};

use super::entities::{NetworkAddress, NodeId};
use super::errors::{AddressParseError, DecodeError};

/// An address as it appears on the wire, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "network", derive(Serialize, Deserialize))]
pub struct WireAddress {
    /// Hex node id.
    pub id: String,
    /// Textual IP address.
    pub ip: String,
    /// Port; wider than u16 so out-of-range values can be reported.
    pub port: u32,
}

impl WireAddress {
    /// Validate into a [`NetworkAddress`].
    pub fn decode(&self) -> Result<NetworkAddress, AddressParseError> {
        let id = NodeId::from_hex(&self.id)?;
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|_| AddressParseError::InvalidHost(self.ip.clone()))?;
        let port = u16::try_from(self.port).map_err(|_| AddressParseError::InvalidPort(self.port))?;
        Ok(NetworkAddress::new(id, ip, port))
    }
}

impl From<&NetworkAddress> for WireAddress {
    fn from(addr: &NetworkAddress) -> Self {
        Self {
            id: addr.id.to_string(),
            ip: addr.ip.to_string(),
            port: u32::from(addr.port),
        }
    }
}

/// Messages on the peer-exchange channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "network", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "network", serde(tag = "type", rename_all = "snake_case"))]
pub enum PexMessage {
    /// Ask the remote for addresses it knows.
    AddressRequest,
    /// Addresses offered by the remote, in order.
    AddressList {
        /// Unvalidated entries.
        addrs: Vec<WireAddress>,
    },
    /// Any message kind this node does not understand.
    #[cfg_attr(feature = "network", serde(other))]
    Unknown,
}

impl PexMessage {
    /// Build an address list from validated addresses.
    pub fn address_list(addrs: &[NetworkAddress]) -> Self {
        Self::AddressList {
            addrs: addrs.iter().map(WireAddress::from).collect(),
        }
    }

    /// Short name of the message kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddressRequest => "address_request",
            Self::AddressList { .. } => "address_list",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PexMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressList { addrs } => write!(f, "address_list({} addrs)", addrs.len()),
            other => f.write_str(other.kind()),
        }
    }
}

/// Decode every entry of an address list, all or nothing.
pub fn decode_addresses(addrs: &[WireAddress]) -> Result<Vec<NetworkAddress>, DecodeError> {
    addrs
        .iter()
        .enumerate()
        .map(|(index, wire)| wire.decode().map_err(|source| DecodeError { index, source }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "0123456789abcdef0123456789abcdef01234567";

    fn wire(ip: &str, port: u32) -> WireAddress {
        WireAddress {
            id: ID.to_string(),
            ip: ip.to_string(),
            port,
        }
    }

    #[test]
    fn test_decode_valid_list_preserves_order() {
        let decoded = decode_addresses(&[wire("1.2.3.4", 1), wire("5.6.7.8", 2)]).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].port, 1);
        assert_eq!(decoded[1].port, 2);
    }

    #[test]
    fn test_one_bad_entry_rejects_whole_list() {
        let err = decode_addresses(&[wire("1.2.3.4", 1), wire("not-an-ip", 2), wire("5.6.7.8", 3)])
            .unwrap_err();
        assert_eq!(err.index, 1);
        assert!(matches!(err.source, AddressParseError::InvalidHost(_)));
    }

    #[test]
    fn test_port_out_of_range_is_rejected() {
        let err = wire("1.2.3.4", 70_000).decode().unwrap_err();
        assert_eq!(err, AddressParseError::InvalidPort(70_000));
    }

    #[test]
    fn test_bad_id_is_rejected() {
        let mut entry = wire("1.2.3.4", 1);
        entry.id = "xyz".into();
        assert!(matches!(entry.decode(), Err(AddressParseError::InvalidId(_))));
    }

    #[test]
    fn test_address_list_from_network_addresses() {
        let addr: NetworkAddress = format!("{ID}@9.9.9.9:26656").parse().unwrap();
        let msg = PexMessage::address_list(&[addr]);
        match &msg {
            PexMessage::AddressList { addrs } => {
                assert_eq!(addrs[0].decode().unwrap(), addr);
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert_eq!(msg.to_string(), "address_list(1 addrs)");
    }

    #[cfg(feature = "network")]
    #[test]
    fn test_unknown_message_type_deserializes_to_unknown() {
        let msg: PexMessage = serde_json::from_str(r#"{"type":"block_part"}"#).unwrap();
        assert_eq!(msg, PexMessage::Unknown);
        let msg: PexMessage = serde_json::from_str(r#"{"type":"address_request"}"#).unwrap();
        assert_eq!(msg, PexMessage::AddressRequest);
    }
}
