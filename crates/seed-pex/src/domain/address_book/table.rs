//! Address table implementation.

use std::collections::HashMap;

use super::bucket::AddressBucket;
use super::security::SubnetKey;
use super::types::KnownAddress;
use crate::domain::NodeId;

/// A table of buckets (either New or Tried)
#[derive(Debug)]
pub struct AddressTable {
    pub(crate) buckets: Vec<AddressBucket>,
    /// Total entries per subnet across all buckets
    pub(crate) subnet_totals: HashMap<SubnetKey, usize>,
    /// Quick lookup: NodeId -> bucket index
    pub(crate) node_to_bucket: HashMap<NodeId, usize>,
}

impl AddressTable {
    /// Create a new table with specified bucket count
    pub fn new(bucket_count: usize) -> Self {
        Self {
            buckets: (0..bucket_count.max(1)).map(|_| AddressBucket::new()).collect(),
            subnet_totals: HashMap::new(),
            node_to_bucket: HashMap::new(),
        }
    }

    /// Get total entry count
    pub fn len(&self) -> usize {
        self.node_to_bucket.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.node_to_bucket.is_empty()
    }

    /// Check if table contains a node
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.node_to_bucket.contains_key(node_id)
    }

    /// Entries from `subnet` in this table
    pub fn subnet_total(&self, subnet: &SubnetKey) -> usize {
        self.subnet_totals.get(subnet).copied().unwrap_or(0)
    }

    /// Look up an entry
    pub fn get(&self, node_id: &NodeId) -> Option<&KnownAddress> {
        let idx = *self.node_to_bucket.get(node_id)?;
        self.buckets.get(idx)?.get(node_id)
    }

    /// Look up an entry for update
    pub fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut KnownAddress> {
        let idx = *self.node_to_bucket.get(node_id)?;
        self.buckets.get_mut(idx)?.get_mut(node_id)
    }

    /// Bucket at `idx`
    pub fn bucket(&self, idx: usize) -> Option<&AddressBucket> {
        self.buckets.get(idx)
    }

    /// Insert into bucket `idx`, which the caller has checked has room.
    pub fn insert(&mut self, idx: usize, entry: KnownAddress) {
        let Some(bucket) = self.buckets.get_mut(idx) else {
            return;
        };
        *self.subnet_totals.entry(entry.subnet()).or_insert(0) += 1;
        self.node_to_bucket.insert(entry.addr.id, idx);
        bucket.add(entry);
    }

    /// Remove an entry, keeping subnet totals in step.
    pub fn remove(&mut self, node_id: &NodeId) -> Option<KnownAddress> {
        let idx = self.node_to_bucket.remove(node_id)?;
        let entry = self.buckets.get_mut(idx)?.remove(node_id)?;
        self.forget_subnet(&entry.subnet());
        Some(entry)
    }

    /// Evict the stalest entry of bucket `idx`.
    pub fn evict_from(&mut self, idx: usize) -> Option<KnownAddress> {
        let entry = self.buckets.get_mut(idx)?.evict_stalest()?;
        self.node_to_bucket.remove(&entry.addr.id);
        self.forget_subnet(&entry.subnet());
        Some(entry)
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = &KnownAddress> {
        self.buckets.iter().flat_map(|b| b.entries().iter())
    }

    /// Get an entry using an externally provided random index function.
    pub fn random_entry_with<F>(&self, mut random_fn: F) -> Option<&KnownAddress>
    where
        F: FnMut(usize) -> usize,
    {
        let total = self.len();
        if total == 0 {
            return None;
        }

        let mut remaining = random_fn(total) % total;
        for bucket in &self.buckets {
            let bucket_len = bucket.len();
            if remaining < bucket_len {
                return bucket.get_entry(remaining);
            }
            remaining -= bucket_len;
        }

        None
    }

    fn forget_subnet(&mut self, subnet: &SubnetKey) {
        if let Some(count) = self.subnet_totals.get_mut(subnet) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.subnet_totals.remove(subnet);
            }
        }
    }
}
