//! Address bucket implementation.

use std::collections::HashMap;

use super::config::AddrBookConfig;
use super::security::SubnetKey;
use super::types::KnownAddress;
use crate::domain::NodeId;

/// A bucket containing address entries with subnet limits
#[derive(Debug, Clone, Default)]
pub struct AddressBucket {
    pub(crate) entries: Vec<KnownAddress>,
    /// Count of entries per subnet in this bucket
    pub(crate) subnet_counts: HashMap<SubnetKey, usize>,
}

impl AddressBucket {
    /// Create a new empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the bucket has no free slot
    pub fn is_full(&self, config: &AddrBookConfig) -> bool {
        self.entries.len() >= config.bucket_size
    }

    /// Whether another entry from `subnet` stays within the per-bucket limit
    pub fn subnet_has_room(&self, subnet: &SubnetKey, config: &AddrBookConfig) -> bool {
        self.subnet_counts.get(subnet).copied().unwrap_or(0) < config.max_per_subnet_per_bucket
    }

    /// Add an entry to the bucket
    pub fn add(&mut self, entry: KnownAddress) {
        *self.subnet_counts.entry(entry.subnet()).or_insert(0) += 1;
        self.entries.push(entry);
    }

    /// Remove an entry by NodeId
    pub fn remove(&mut self, node_id: &NodeId) -> Option<KnownAddress> {
        let pos = self.entries.iter().position(|e| &e.addr.id == node_id)?;
        Some(self.remove_at(pos))
    }

    /// Get all entries
    pub fn entries(&self) -> &[KnownAddress] {
        &self.entries
    }

    /// Find an entry by NodeId
    pub fn get(&self, node_id: &NodeId) -> Option<&KnownAddress> {
        self.entries.iter().find(|e| &e.addr.id == node_id)
    }

    /// Find an entry by NodeId for update
    pub fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut KnownAddress> {
        self.entries.iter_mut().find(|e| &e.addr.id == node_id)
    }

    /// Get entry at a specific index.
    pub fn get_entry(&self, index: usize) -> Option<&KnownAddress> {
        self.entries.get(index)
    }

    /// Evict the stalest entry: never connected first, then oldest first seen.
    pub fn evict_stalest(&mut self) -> Option<KnownAddress> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.staleness())
            .map(|(idx, _)| idx)?;
        Some(self.remove_at(idx))
    }

    fn remove_at(&mut self, pos: usize) -> KnownAddress {
        let entry = self.entries.remove(pos);
        let subnet = entry.subnet();
        if let Some(count) = self.subnet_counts.get_mut(&subnet) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.subnet_counts.remove(&subnet);
            }
        }
        entry
    }
}
