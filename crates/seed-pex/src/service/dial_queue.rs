//! Bounded, non-blocking dial queue shared by every worker.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;

use crate::domain::CandidateAddress;

/// Result of offering a candidate to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The candidate will be dialed.
    Enqueued,
    /// The queue was full; the candidate was discarded.
    Dropped,
}

/// Fixed-capacity FIFO of candidates.
///
/// Producers never wait: a full queue drops the new item. Any number of
/// workers may wait on [`next`](Self::next); each item goes to exactly one.
#[derive(Debug)]
pub struct DialQueue {
    tx: mpsc::Sender<CandidateAddress>,
    rx: Arc<Mutex<mpsc::Receiver<CandidateAddress>>>,
}

impl DialQueue {
    /// Create a queue holding at most `capacity` candidates.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Offer a candidate without blocking.
    pub fn try_enqueue(&self, candidate: CandidateAddress) -> EnqueueOutcome {
        match self.tx.try_send(candidate) {
            Ok(()) => EnqueueOutcome::Enqueued,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => EnqueueOutcome::Dropped,
        }
    }

    /// Wait for the next candidate.
    ///
    /// Cancel safe: dropping the future loses no item.
    pub async fn next(&self) -> Option<CandidateAddress> {
        self.rx.lock().await.recv().await
    }

    /// Number of queued candidates.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued candidates.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}
