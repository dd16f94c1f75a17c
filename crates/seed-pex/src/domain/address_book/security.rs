//! Address book security types.
//!
//! Subnet grouping and keyed bucket placement.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::net::IpAddr;

/// Subnet key for grouping addresses.
/// Stores /16 for IPv4 and /32 for IPv6.
///
/// IPv4-mapped IPv6 addresses group with their IPv4 form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetKey(pub [u8; 4]);

impl SubnetKey {
    /// Extract subnet key from IP address.
    pub fn from_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => {
                let o = v4.octets();
                SubnetKey([o[0], o[1], 0, 0])
            }
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => Self::from_ip(&IpAddr::V4(v4)),
                None => {
                    let o = v6.octets();
                    SubnetKey([o[0], o[1], o[2], o[3]])
                }
            },
        }
    }
}

/// Keyed hash for bucket placement.
///
/// The SipHash key is drawn once per book, so bucket placement cannot be
/// predicted by a remote peer.
#[derive(Debug, Clone, Default)]
pub struct BucketHasher {
    state: RandomState,
}

impl BucketHasher {
    /// Create a hasher with a fresh random key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash any value into a bucket index below `buckets`.
    pub fn bucket<T: Hash>(&self, value: &T, buckets: usize) -> usize {
        (self.state.hash_one(value) as usize) % buckets.max(1)
    }
}
