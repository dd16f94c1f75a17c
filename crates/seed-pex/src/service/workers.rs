//! Dial worker pool.
//!
//! Each worker takes one candidate at a time, filters it, dials it through
//! the switch and records the outcome in the address book.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::domain::{AddressBookError, CandidateAddress, DialError};
use crate::ports::{AddressBook, Switch};
use crate::service::dial_queue::DialQueue;

/// Why a candidate was not dialed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Unspecified IP or port 0.
    Unspecified,
    /// Strict mode and the address is not routable.
    NotRoutable,
    /// The switch is already dialing or connected to it.
    AlreadyConnected,
    /// The switch declined to dial (connection limit or shutdown).
    Refused,
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialOutcome {
    /// Filtered before dialing, or refused by the switch without a connection attempt.
    Skipped(SkipReason),
    /// Dial failed; the attempt was recorded.
    DialFailed(DialError),
    /// Dial succeeded and the address was stored and marked good.
    Registered,
    /// Dial succeeded but the book refused the address.
    RegistrationFailed(AddressBookError),
}

/// Shared, read-only state every worker uses.
pub struct DialContext {
    book: Arc<dyn AddressBook>,
    switch: Arc<dyn Switch>,
    strict: bool,
}

impl DialContext {
    pub fn new(book: Arc<dyn AddressBook>, switch: Arc<dyn Switch>, strict: bool) -> Self {
        Self {
            book,
            switch,
            strict,
        }
    }

    /// Process one candidate to completion.
    pub async fn process(&self, candidate: CandidateAddress) -> DialOutcome {
        let addr = candidate.addr;

        if addr.is_unspecified() {
            debug!(addr = %addr, "Ignoring unspecified address");
            return DialOutcome::Skipped(SkipReason::Unspecified);
        }

        if self.strict && !addr.routable() {
            debug!(addr = %addr, "Ignoring non-routable address");
            return DialOutcome::Skipped(SkipReason::NotRoutable);
        }

        if self.switch.is_dialing_or_existing(&addr) {
            debug!(addr = %addr, "Already dialing or connected");
            return DialOutcome::Skipped(SkipReason::AlreadyConnected);
        }

        if let Err(e) = self.switch.dial(&addr).await {
            if e.is_refusal() {
                debug!(addr = %addr, error = %e, "Switch refused dial");
                return DialOutcome::Skipped(match e {
                    DialError::AlreadyConnected => SkipReason::AlreadyConnected,
                    _ => SkipReason::Refused,
                });
            }
            debug!(addr = %addr, error = %e, "Dial failed");
            self.book.mark_attempt(&addr);
            return DialOutcome::DialFailed(e);
        }

        let source = candidate
            .source
            .unwrap_or_else(|| self.switch.self_address());
        if let Err(e) = self.book.add_address(&addr, &source) {
            error!(addr = %addr, source = %source, error = %e, "Failed to add dialed address");
            return DialOutcome::RegistrationFailed(e);
        }

        info!(addr = %addr, "Dialed peer, marking good");
        self.book.mark_good(&addr.id);
        DialOutcome::Registered
    }
}

/// Spawn `count` workers on `handle`, all draining `queue` until `shutdown`
/// turns true.
pub fn spawn_workers(
    handle: &Handle,
    count: usize,
    queue: Arc<DialQueue>,
    ctx: Arc<DialContext>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|index| {
            handle.spawn(run_worker(
                index,
                Arc::clone(&queue),
                Arc::clone(&ctx),
                shutdown.clone(),
            ))
        })
        .collect()
}

async fn run_worker(
    index: usize,
    queue: Arc<DialQueue>,
    ctx: Arc<DialContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker = index, "Dial worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        let candidate = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = queue.next() => match next {
                Some(candidate) => candidate,
                None => break,
            },
        };

        debug!(worker = index, candidate = %candidate, "Processing candidate");
        // Runs to completion; shutdown is checked again afterwards.
        ctx.process(candidate).await;
    }
    debug!(worker = index, "Dial worker stopped");
}
