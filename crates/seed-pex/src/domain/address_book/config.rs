//! Address book configuration.

/// Configuration for the address book
#[derive(Debug, Clone)]
pub struct AddrBookConfig {
    /// Number of buckets in the New table
    pub new_bucket_count: usize,
    /// Number of buckets in the Tried table
    pub tried_bucket_count: usize,
    /// Maximum entries per bucket
    pub bucket_size: usize,
    /// Maximum entries from the same subnet per bucket
    pub max_per_subnet_per_bucket: usize,
    /// Maximum entries from the same subnet across both tables
    pub max_per_subnet_total: usize,
    /// Reject non-routable addresses
    pub strict: bool,
    /// Below this size the book asks peers for more addresses
    pub need_addr_threshold: usize,
    /// Failed attempts after which a never-good address is dropped
    pub max_attempts: u32,
    /// Percentage of the book returned by a selection
    pub selection_percent: usize,
    /// Lower bound on a selection (when the book is large enough)
    pub min_selection: usize,
    /// Upper bound on a selection
    pub max_selection: usize,
}

impl Default for AddrBookConfig {
    fn default() -> Self {
        Self {
            new_bucket_count: 256,
            tried_bucket_count: 64,
            bucket_size: 64,
            max_per_subnet_per_bucket: 16,
            max_per_subnet_total: 256,
            strict: true,
            need_addr_threshold: 1000,
            max_attempts: 10,
            selection_percent: 23,
            min_selection: 32,
            max_selection: 250,
        }
    }
}

impl AddrBookConfig {
    /// Small tables for tests.
    pub fn for_testing() -> Self {
        Self {
            new_bucket_count: 16,
            tried_bucket_count: 8,
            bucket_size: 4,
            max_per_subnet_per_bucket: 2,
            max_per_subnet_total: 8,
            ..Self::default()
        }
    }

    /// Default tables with the given routability policy.
    pub fn with_strict(strict: bool) -> Self {
        Self {
            strict,
            ..Self::default()
        }
    }
}
