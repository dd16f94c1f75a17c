//! Reactor configuration.

use super::errors::ReactorError;

/// Fixed settings for a [`SeedReactor`](crate::service::SeedReactor).
///
/// Built once at startup and handed to the constructor; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactorConfig {
    /// Capacity of the dial queue. Items beyond it are dropped.
    pub dial_queue_capacity: usize,
    /// Number of concurrent dial workers.
    pub dial_workers: usize,
    /// Skip non-routable addresses on both the dial and admission paths.
    pub strict_routability: bool,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            dial_queue_capacity: 1000,
            dial_workers: 20,
            strict_routability: true,
        }
    }
}

impl ReactorConfig {
    /// Small queue and pool, strict mode on.
    pub fn for_testing() -> Self {
        Self {
            dial_queue_capacity: 8,
            dial_workers: 2,
            strict_routability: true,
        }
    }

    /// Both sizes must be positive.
    pub fn validate(&self) -> Result<(), ReactorError> {
        if self.dial_queue_capacity == 0 {
            return Err(ReactorError::InvalidConfig(
                "dial_queue_capacity must be greater than 0".into(),
            ));
        }
        if self.dial_workers == 0 {
            return Err(ReactorError::InvalidConfig(
                "dial_workers must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
