//! # Seed Reactor Service
//!
//! The peer-exchange reactor: decodes gossip, feeds a bounded dial queue,
//! runs the dial worker pool and filters admitted peers. Everything else is
//! delegated to the wrapped base behaviour.

// Semantic submodules
mod dial_queue;
mod reactor;
mod workers;

// Re-export public API
pub use dial_queue::{DialQueue, EnqueueOutcome};
pub use reactor::SeedReactor;
pub use workers::{spawn_workers, DialContext, DialOutcome, SkipReason};

#[cfg(test)]
mod tests;
