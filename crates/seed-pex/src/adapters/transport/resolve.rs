//! Resolution of `id@host:port` strings, hostnames included.

use std::net::SocketAddr;

use tokio::net::lookup_host;
use tracing::warn;

use super::error::TransportError;
use crate::domain::{AddressParseError, NetworkAddress, NodeId};

/// Resolve `id@host:port`, preferring an IPv4 result.
pub async fn resolve_address(s: &str) -> Result<NetworkAddress, TransportError> {
    let s = s.trim();
    let (id, host) = s
        .split_once('@')
        .ok_or_else(|| AddressParseError::MissingId(s.to_string()))?;
    let id = NodeId::from_hex(id)?;

    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(NetworkAddress::from_socket_addr(id, addr));
    }

    let resolved: Vec<SocketAddr> = lookup_host(host)
        .await
        .map_err(|e| TransportError::Resolve(format!("{host}: {e}")))?
        .collect();
    resolved
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| resolved.first())
        .map(|a| NetworkAddress::from_socket_addr(id, *a))
        .ok_or_else(|| TransportError::Resolve(host.to_string()))
}

/// Resolve a comma-separated list, skipping (and logging) entries that fail.
pub async fn resolve_addresses(list: &str) -> Vec<NetworkAddress> {
    let mut out = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match resolve_address(entry).await {
            Ok(addr) => out.push(addr),
            Err(e) => warn!(entry, error = %e, "Ignoring unresolvable address"),
        }
    }
    out
}
