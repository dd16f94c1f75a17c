//! Core Domain Entities for Peer Exchange
//!
//! Node identities, network addresses and the unit of dial work.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use super::errors::AddressParseError;
use super::routability;

/// Length of a node identifier in bytes.
pub const NODE_ID_LEN: usize = 20;

/// 160-bit node identifier derived from the node's public key.
///
/// Rendered as 40 lowercase hex characters on the wire and in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl NodeId {
    /// Create a NodeId from raw bytes.
    pub fn new(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Parse a NodeId from its hex representation.
    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let bytes = hex::decode(s).map_err(|_| AddressParseError::InvalidId(s.to_string()))?;
        let bytes: [u8; NODE_ID_LEN] = bytes
            .try_into()
            .map_err(|_| AddressParseError::InvalidId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl FromStr for NodeId {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// A remote endpoint: peer identity plus IP and port.
///
/// Immutable once constructed. The textual form is `id@ip:port`
/// (IPv6 hosts are bracketed, e.g. `id@[2001:db8::1]:26656`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkAddress {
    /// Identity of the node listening at this address.
    pub id: NodeId,
    /// IP address (v4 or v6).
    pub ip: IpAddr,
    /// Port number.
    pub port: u16,
}

impl NetworkAddress {
    /// Create a new network address.
    pub fn new(id: NodeId, ip: IpAddr, port: u16) -> Self {
        Self { id, ip, port }
    }

    /// Create an address from an identity and a socket address.
    pub fn from_socket_addr(id: NodeId, addr: SocketAddr) -> Self {
        Self::new(id, addr.ip(), addr.port())
    }

    /// The socket address to dial.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// `ip:port` form used by the transport.
    pub fn dial_string(&self) -> String {
        self.socket_addr().to_string()
    }

    /// True when the address carries no usable endpoint (unspecified IP or port 0).
    pub fn is_unspecified(&self) -> bool {
        self.ip.is_unspecified() || self.port == 0
    }

    /// Whether the address is reachable from the public network.
    pub fn routable(&self) -> bool {
        !self.is_unspecified() && routability::is_routable(&self.ip)
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.socket_addr())
    }
}

impl FromStr for NetworkAddress {
    type Err = AddressParseError;

    /// Parse `id@ip:port`. Hostnames are not resolved here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, host) = s
            .trim()
            .split_once('@')
            .ok_or_else(|| AddressParseError::MissingId(s.to_string()))?;
        let id = NodeId::from_hex(id)?;
        let addr: SocketAddr = host
            .parse()
            .map_err(|_| AddressParseError::InvalidHost(host.to_string()))?;
        Ok(Self::from_socket_addr(id, addr))
    }
}

/// A unit of dial work: an address learned from gossip plus who reported it.
///
/// Created once per address in an address-list message, consumed exactly
/// once by a dial worker and then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateAddress {
    /// Address to dial.
    pub addr: NetworkAddress,
    /// Peer that reported the address, if known.
    pub source: Option<NetworkAddress>,
}

impl CandidateAddress {
    /// Create a candidate with a known source.
    pub fn new(addr: NetworkAddress, source: Option<NetworkAddress>) -> Self {
        Self { addr, source }
    }
}

impl fmt::Display for CandidateAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{} (from {})", self.addr, src),
            None => write!(f, "{}", self.addr),
        }
    }
}

/// Unix timestamp in seconds
///
/// Timestamps are clamped to a reasonable maximum so that persisted or
/// remote values cannot corrupt ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    /// Create a new timestamp, clamping to MAX_REASONABLE.
    pub fn new(secs: u64) -> Self {
        Self(secs.min(Self::MAX_REASONABLE))
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds to timestamp (saturating at MAX_REASONABLE).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs).min(Self::MAX_REASONABLE))
    }

    /// Subtract seconds from timestamp (saturating at 0).
    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ID: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_node_id_hex_round_trip() {
        let id = NodeId::from_hex(ID).unwrap();
        assert_eq!(id.to_string(), ID);
    }

    #[test]
    fn test_node_id_rejects_wrong_length() {
        assert!(NodeId::from_hex("abcd").is_err());
        assert!(NodeId::from_hex("zz23456789abcdef0123456789abcdef01234567").is_err());
    }

    #[test]
    fn test_parse_network_address() {
        let addr: NetworkAddress = format!("{ID}@1.2.3.4:26656").parse().unwrap();
        assert_eq!(addr.ip, IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)));
        assert_eq!(addr.port, 26656);
        assert_eq!(addr.to_string(), format!("{ID}@1.2.3.4:26656"));
        assert_eq!(addr.dial_string(), "1.2.3.4:26656");
    }

    #[test]
    fn test_parse_ipv6_network_address() {
        let addr: NetworkAddress = format!("{ID}@[2001:4860::8888]:26656").parse().unwrap();
        assert!(addr.ip.is_ipv6());
        assert_eq!(addr.to_string(), format!("{ID}@[2001:4860::8888]:26656"));
    }

    #[test]
    fn test_parse_rejects_missing_id() {
        let err = "1.2.3.4:26656".parse::<NetworkAddress>().unwrap_err();
        assert!(matches!(err, AddressParseError::MissingId(_)));
    }

    #[test]
    fn test_parse_rejects_hostname() {
        let err = format!("{ID}@seed.example.com:26656")
            .parse::<NetworkAddress>()
            .unwrap_err();
        assert!(matches!(err, AddressParseError::InvalidHost(_)));
    }

    #[test]
    fn test_unspecified_address_is_not_routable() {
        let id = NodeId::from_hex(ID).unwrap();
        let zero = NetworkAddress::new(id, IpAddr::V4(Ipv4Addr::UNSPECIFIED), 26656);
        let no_port = NetworkAddress::new(id, IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 0);
        assert!(zero.is_unspecified());
        assert!(no_port.is_unspecified());
        assert!(!zero.routable());
        assert!(!no_port.routable());
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = Timestamp::new(100);
        assert_eq!(ts.add_secs(50).as_secs(), 150);
        assert_eq!(ts.sub_secs(50).as_secs(), 50);
        assert_eq!(ts.sub_secs(200).as_secs(), 0);
    }
}
