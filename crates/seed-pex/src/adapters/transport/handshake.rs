//! Node information exchanged when a connection opens.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use super::codec::{read_frame, write_frame};
use super::error::TransportError;
use crate::domain::{NetworkAddress, NodeId};

/// What each side tells the other before any peer-exchange message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Hex node id.
    pub id: String,
    /// `ip:port` the node accepts connections on.
    pub listen_addr: String,
    /// Chain id.
    pub network: String,
    /// Software version.
    pub version: String,
    /// Node name.
    pub moniker: String,
}

impl NodeInfo {
    /// Parsed node id.
    pub fn node_id(&self) -> Result<NodeId, TransportError> {
        Ok(NodeId::from_hex(&self.id)?)
    }

    /// The advertised listen address.
    ///
    /// An unspecified advertised IP is replaced with the IP the connection
    /// came from.
    pub fn listen_address(&self, remote: SocketAddr) -> Option<NetworkAddress> {
        let id = NodeId::from_hex(&self.id).ok()?;
        let advertised: SocketAddr = self.listen_addr.parse().ok()?;
        let ip = if advertised.ip().is_unspecified() {
            remote.ip()
        } else {
            advertised.ip()
        };
        Some(NetworkAddress::new(id, ip, advertised.port()))
    }

    /// Check a remote's info against ours. Returns the remote id.
    pub fn validate_remote(&self, theirs: &NodeInfo) -> Result<NodeId, TransportError> {
        let their_id = theirs.node_id()?;
        if theirs.network != self.network {
            return Err(TransportError::NetworkMismatch {
                ours: self.network.clone(),
                theirs: theirs.network.clone(),
            });
        }
        if theirs.id == self.id {
            return Err(TransportError::SelfConnection);
        }
        if theirs.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(TransportError::InvalidHandshake(format!(
                "bad listen address {:?}",
                theirs.listen_addr
            )));
        }
        Ok(their_id)
    }
}

/// Send our info and read theirs, both within `timeout`.
pub(crate) async fn exchange(
    stream: &mut TcpStream,
    ours: &NodeInfo,
    max_frame_size: usize,
    timeout: Duration,
) -> Result<NodeInfo, TransportError> {
    let io = async {
        write_frame(&mut *stream, ours, max_frame_size).await?;
        let theirs: NodeInfo = read_frame(&mut *stream, max_frame_size).await?;
        Ok::<_, TransportError>(theirs)
    };
    tokio::time::timeout(timeout, io)
        .await
        .map_err(|_| TransportError::Timeout)?
}
