//! Shared acknowledgement state of one queued operation.

#[cfg(test)] mod tests;

use std::collections::BTreeSet;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::OpId;
use crate::OpKind;
use crate::Operation;
use crate::PeerId;

/// Tracks which peers have acknowledged one operation.
///
/// The tracker owns its operation. The tracker itself is shared: the queue's
/// messages buffer holds one handle, and any caller that fetched the tracker
/// via `get_operation_status` holds another. Ack state is synchronized
/// internally so those holders can query it outside the queue lock.
///
/// `majority_size` and `num_peers` are fixed at construction. Untracking a
/// peer later never strips its recorded acknowledgements, so `is_all_done`
/// is monotone: the ack sets only grow against a constant peer count.
pub struct OperationStatusTracker {
    operation: Operation,
    majority_size: usize,
    num_peers: usize,
    acks: Mutex<AckSets>,

    /// Cardinality of whichever set the operation's kind dispatches to.
    acked: AtomicUsize,
}

/// Replicate and commit acknowledgements are recorded separately; commits
/// are executed asynchronously on the followers and ack on their own
/// watermark.
#[derive(Default)]
struct AckSets {
    replicate: BTreeSet<PeerId>,
    commit: BTreeSet<PeerId>,
}

impl OperationStatusTracker {
    pub fn new(operation: Operation, majority_size: usize, num_peers: usize) -> Self {
        debug_assert!(
            majority_size <= num_peers,
            "majority size {} exceeds peer count {}",
            majority_size,
            num_peers
        );
        Self {
            operation,
            majority_size,
            num_peers,
            acks: Mutex::new(AckSets::default()),
            acked: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> OpId {
        self.operation.id()
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Record an acknowledgement from `peer` for the operation's own kind.
    /// Re-acking by the same peer is a no-op.
    pub fn ack_peer(&self, peer: &str) {
        let mut acks = self.acks.lock();
        let set = match self.operation.kind() {
            OpKind::Replicate => &mut acks.replicate,
            OpKind::Commit => &mut acks.commit,
        };
        if set.insert(peer.to_string()) {
            self.acked.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// True once at least a majority of peers has acknowledged the
    /// operation.
    pub fn is_done(&self) -> bool {
        self.acked.load(Ordering::Relaxed) >= self.majority_size
    }

    /// True once every peer has acknowledged the operation. Once true it
    /// stays true for the life of the tracker.
    pub fn is_all_done(&self) -> bool {
        self.acked.load(Ordering::Relaxed) >= self.num_peers
    }

    pub fn ack_count(&self) -> usize {
        self.acked.load(Ordering::Relaxed)
    }

    /// Peers that acknowledged replication.
    pub fn replicate_acks(&self) -> BTreeSet<PeerId> {
        self.acks.lock().replicate.clone()
    }

    /// Peers that acknowledged the commit.
    pub fn commit_acks(&self) -> BTreeSet<PeerId> {
        self.acks.lock().commit.clone()
    }
}

impl Display for OperationStatusTracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "acked {}/{} (majority: {}, done: {}, all done: {})",
            self.ack_count(),
            self.num_peers,
            self.majority_size,
            self.is_done(),
            self.is_all_done()
        )
    }
}
