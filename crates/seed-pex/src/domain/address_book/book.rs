//! Main AddrBook implementation.
//!
//! Reference: Bitcoin Core's `addrman.h`

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use super::config::AddrBookConfig;
use super::security::{BucketHasher, SubnetKey};
use super::table::AddressTable;
use super::types::{AddrBookStats, AddressState, KnownAddress};
use crate::domain::{AddressBookError, NetworkAddress, NodeId};
use crate::ports::{AddressBook, TimeSource};

struct BookState {
    /// Addresses we've heard about but never connected to
    new_table: AddressTable,
    /// Addresses we've successfully connected to
    tried_table: AddressTable,
}

/// Thread-safe address book with New/Tried segregation
///
/// 1. Gossiped addresses go to the New table, bucketed by source+address subnet
/// 2. Only after a successful connection do they move to the Tried table
/// 3. Per-subnet limits prevent flooding from a single IP range
pub struct AddrBook {
    config: AddrBookConfig,
    hasher: BucketHasher,
    time: Arc<dyn TimeSource>,
    state: RwLock<BookState>,
    our_addrs: RwLock<HashSet<NetworkAddress>>,
}

impl AddrBook {
    /// Create an empty address book
    pub fn new(config: AddrBookConfig, time: Arc<dyn TimeSource>) -> Self {
        Self {
            state: RwLock::new(BookState {
                new_table: AddressTable::new(config.new_bucket_count),
                tried_table: AddressTable::new(config.tried_bucket_count),
            }),
            hasher: BucketHasher::new(),
            our_addrs: RwLock::new(HashSet::new()),
            config,
            time,
        }
    }

    /// Whether non-routable addresses are refused.
    pub fn is_strict(&self) -> bool {
        self.config.strict
    }

    /// Remember one of this node's own addresses so it is never stored.
    pub fn add_our_address(&self, addr: NetworkAddress) {
        self.our_addrs.write().insert(addr);
    }

    /// Whether `addr` is one of ours, by identity or endpoint.
    pub fn is_our_address(&self, addr: &NetworkAddress) -> bool {
        self.our_addrs
            .read()
            .iter()
            .any(|ours| ours.id == addr.id || ours.socket_addr() == addr.socket_addr())
    }

    /// Add an address learned from `src`.
    ///
    /// A known address only has its source replaced; its bucket, state and
    /// history stay as they are.
    pub fn add(&self, addr: &NetworkAddress, src: &NetworkAddress) -> Result<(), AddressBookError> {
        self.check_acceptable(addr)?;
        let mut state = self.state.write();
        let state = &mut *state;
        let known = match state.new_table.get_mut(&addr.id) {
            Some(entry) => Some(entry),
            None => state.tried_table.get_mut(&addr.id),
        };
        if let Some(entry) = known {
            entry.source = *src;
            return Ok(());
        }
        let entry = KnownAddress::new(*addr, *src, self.time.now());
        self.insert_new(state, entry)
    }

    /// Record a successful connection, promoting the address to the Tried table.
    ///
    /// Unknown ids are ignored.
    pub fn mark_good(&self, id: &NodeId) {
        let now = self.time.now();
        let mut state = self.state.write();

        if let Some(entry) = state.tried_table.get_mut(id) {
            entry.last_success = Some(now);
            entry.attempts = 0;
            return;
        }

        let Some(mut entry) = state.new_table.remove(id) else {
            return;
        };
        entry.state = AddressState::Good;
        entry.last_success = Some(now);
        entry.attempts = 0;

        let idx = self
            .hasher
            .bucket(&entry.subnet(), self.config.tried_bucket_count);
        let full = state
            .tried_table
            .bucket(idx)
            .is_some_and(|b| b.is_full(&self.config));
        if full {
            if let Some(mut evicted) = state.tried_table.evict_from(idx) {
                debug!(addr = %evicted.addr, "Demoting address from tried table");
                evicted.state = AddressState::New;
                let _ = self.insert_new(&mut state, evicted);
            }
        }
        debug!(addr = %entry.addr, "Marked address good");
        state.tried_table.insert(idx, entry);
    }

    /// Record a failed dial.
    ///
    /// Never-good addresses are dropped after `max_attempts` failures.
    pub fn mark_attempt(&self, addr: &NetworkAddress) {
        let now = self.time.now();
        let mut state = self.state.write();

        if let Some(entry) = state.tried_table.get_mut(&addr.id) {
            entry.last_attempt = Some(now);
            entry.attempts = entry.attempts.saturating_add(1);
            return;
        }

        let Some(entry) = state.new_table.get_mut(&addr.id) else {
            return;
        };
        entry.last_attempt = Some(now);
        entry.attempts = entry.attempts.saturating_add(1);
        entry.state = AddressState::Attempted;

        if entry.last_success.is_none() && entry.attempts >= self.config.max_attempts {
            debug!(addr = %addr, attempts = entry.attempts, "Dropping unreachable address");
            state.new_table.remove(&addr.id);
        }
    }

    /// Random sample of known addresses for gossip.
    ///
    /// `selection_percent` of the book, at least `min_selection` and at most
    /// `max_selection`, never more than the book holds.
    pub fn selection(&self) -> Vec<NetworkAddress> {
        let mut all: Vec<NetworkAddress> = {
            let state = self.state.read();
            state
                .new_table
                .iter()
                .chain(state.tried_table.iter())
                .map(|e| e.addr)
                .collect()
        };

        let size = all.len();
        let wanted = (size * self.config.selection_percent / 100)
            .max(self.config.min_selection)
            .min(self.config.max_selection)
            .min(size);

        let mut rng = rand::thread_rng();
        all.shuffle(&mut rng);
        all.truncate(wanted);
        all
    }

    /// Pick one address to dial.
    ///
    /// `bias_towards_new` (0-100) is the chance of drawing from the New table
    /// when both tables have entries.
    pub fn pick_address(&self, bias_towards_new: u8) -> Option<NetworkAddress> {
        let state = self.state.read();
        let mut rng = rand::thread_rng();

        let use_new = match (state.new_table.is_empty(), state.tried_table.is_empty()) {
            (true, true) => return None,
            (false, true) => true,
            (true, false) => false,
            (false, false) => rng.gen_range(0..100u8) < bias_towards_new.min(100),
        };

        let table = if use_new {
            &state.new_table
        } else {
            &state.tried_table
        };
        table
            .random_entry_with(|n| rng.gen_range(0..n))
            .map(|e| e.addr)
    }

    /// Total number of known addresses.
    pub fn size(&self) -> usize {
        let state = self.state.read();
        state.new_table.len() + state.tried_table.len()
    }

    /// Whether the book holds no addresses.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether the book is small enough to ask peers for more.
    pub fn need_more_addrs(&self) -> bool {
        self.size() < self.config.need_addr_threshold
    }

    /// Whether the id is known.
    pub fn contains(&self, id: &NodeId) -> bool {
        let state = self.state.read();
        state.new_table.contains(id) || state.tried_table.contains(id)
    }

    /// Copy of the entry for `id`.
    pub fn get(&self, id: &NodeId) -> Option<KnownAddress> {
        let state = self.state.read();
        state
            .tried_table
            .get(id)
            .or_else(|| state.new_table.get(id))
            .cloned()
    }

    /// Get statistics
    pub fn stats(&self) -> AddrBookStats {
        let state = self.state.read();
        AddrBookStats {
            new_count: state.new_table.len(),
            attempted_count: state
                .new_table
                .iter()
                .filter(|e| e.state == AddressState::Attempted)
                .count(),
            tried_count: state.tried_table.len(),
        }
    }

    /// Every entry, for persistence.
    pub fn snapshot(&self) -> Vec<KnownAddress> {
        let state = self.state.read();
        state
            .tried_table
            .iter()
            .chain(state.new_table.iter())
            .cloned()
            .collect()
    }

    /// Load previously persisted entries, returning how many were kept.
    ///
    /// Entries are placed afresh with this book's hash key; invalid, own or
    /// (in strict mode) non-routable entries are skipped.
    pub fn restore(&self, entries: Vec<KnownAddress>) -> usize {
        let mut restored = 0;
        let mut state = self.state.write();
        for entry in entries {
            if self.check_acceptable(&entry.addr).is_err()
                || state.tried_table.contains(&entry.addr.id)
                || state.new_table.contains(&entry.addr.id)
            {
                continue;
            }
            let placed = if entry.state == AddressState::Good {
                let idx = self
                    .hasher
                    .bucket(&entry.subnet(), self.config.tried_bucket_count);
                let has_room = state
                    .tried_table
                    .bucket(idx)
                    .is_some_and(|b| !b.is_full(&self.config));
                if has_room {
                    state.tried_table.insert(idx, entry);
                    true
                } else {
                    false
                }
            } else {
                self.insert_new(&mut state, entry).is_ok()
            };
            if placed {
                restored += 1;
            }
        }
        restored
    }

    fn check_acceptable(&self, addr: &NetworkAddress) -> Result<(), AddressBookError> {
        if addr.is_unspecified() {
            return Err(AddressBookError::Invalid(*addr));
        }
        if self.is_our_address(addr) {
            return Err(AddressBookError::SelfAddress(*addr));
        }
        if self.config.strict && !addr.routable() {
            return Err(AddressBookError::NonRoutable(*addr));
        }
        Ok(())
    }

    fn insert_new(&self, state: &mut BookState, entry: KnownAddress) -> Result<(), AddressBookError> {
        let addr_subnet = entry.subnet();
        let total = state.new_table.subnet_total(&addr_subnet)
            + state.tried_table.subnet_total(&addr_subnet);
        if total >= self.config.max_per_subnet_total {
            return Err(AddressBookError::SubnetLimitReached(entry.addr));
        }

        let idx = self.new_bucket(&entry.source_subnet(), &addr_subnet);
        let Some(bucket) = state.new_table.bucket(idx) else {
            return Err(AddressBookError::Invalid(entry.addr));
        };
        if !bucket.subnet_has_room(&addr_subnet, &self.config) {
            return Err(AddressBookError::SubnetLimitReached(entry.addr));
        }
        if bucket.is_full(&self.config) {
            if let Some(evicted) = state.new_table.evict_from(idx) {
                debug!(addr = %evicted.addr, "Evicted stale address from new table");
            }
        }

        state.new_table.insert(idx, entry);
        Ok(())
    }

    /// Combines source and address subnets so one source cannot fill every bucket.
    fn new_bucket(&self, source_subnet: &SubnetKey, addr_subnet: &SubnetKey) -> usize {
        self.hasher
            .bucket(&(source_subnet, addr_subnet), self.config.new_bucket_count)
    }
}

impl fmt::Debug for AddrBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddrBook")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl AddressBook for AddrBook {
    fn mark_good(&self, id: &NodeId) {
        AddrBook::mark_good(self, id)
    }

    fn mark_attempt(&self, addr: &NetworkAddress) {
        AddrBook::mark_attempt(self, addr)
    }

    fn add_address(&self, addr: &NetworkAddress, src: &NetworkAddress) -> Result<(), AddressBookError> {
        self.add(addr, src)
    }

    fn selection(&self) -> Vec<NetworkAddress> {
        AddrBook::selection(self)
    }

    fn size(&self) -> usize {
        AddrBook::size(self)
    }

    fn need_more_addrs(&self) -> bool {
        AddrBook::need_more_addrs(self)
    }

    fn pick_address(&self, bias_towards_new: u8) -> Option<NetworkAddress> {
        AddrBook::pick_address(self, bias_towards_new)
    }
}
