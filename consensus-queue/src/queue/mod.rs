//! The queue of messages the leader sends to its peers.
//!
//! The consensus driver appends operations; the transport drains per-peer
//! batches with [`PeerMessageQueue::request_for_peer`] and feeds peer
//! replies back through [`PeerMessageQueue::response_from_peer`]. Memory is
//! reclaimed from the oldest fully-acknowledged prefix whenever a soft limit
//! is exceeded.

mod dump;


use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::Mutex;
use validit::Validate;

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::mem_tracker::MemTracker;
use crate::mem_tracker::MemTrackerRegistry;
use crate::metrics::MetricContext;
use crate::metrics::QueueMetrics;
use crate::op_id::OpId;
use crate::operation::OpKind;
use crate::operation::Operation;
use crate::request::PeerRequest;
use crate::status_tracker::OperationStatusTracker;
use crate::watermark::PeerWatermarks;
use crate::PeerId;

/// Lifecycle state of a queue.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
enum QueueState {
    Open,
    Closed,
}

/// State guarded by the queue lock.
struct Inner {
    state: QueueState,

    /// Queued operations, iterated in ascending OpId order.
    messages: BTreeMap<OpId, Arc<OperationStatusTracker>>,

    /// Per-peer acknowledgement watermarks.
    watermarks: BTreeMap<PeerId, PeerWatermarks>,
}

/// The leader-side replication queue for one tablet.
///
/// Every public method is safe to call from concurrent threads: appends,
/// peer responses, batch assembly and introspection all serialize on one
/// short-lived lock. The lock is held across no I/O.
///
/// The queue shares ownership of each [`OperationStatusTracker`] with any
/// caller that retrieved one via [`get_operation_status`], and shares its
/// memory accounting with a process-wide parent tracker, so that pressure
/// from sibling queues is visible at admission time.
///
/// [`get_operation_status`]: PeerMessageQueue::get_operation_status
pub struct PeerMessageQueue {
    inner: Mutex<Inner>,

    /// Process-wide consensus-memory accounting, shared by every queue.
    parent_tracker: Arc<MemTracker>,

    /// This queue's share, forwarding to `parent_tracker`.
    tracker: Arc<MemTracker>,

    metrics: QueueMetrics,

    local_hard_limit_bytes: u64,
    global_hard_limit_bytes: u64,
    max_batch_size_bytes: u64,
    dump_on_full: bool,
}

impl PeerMessageQueue {
    /// Create an open queue.
    ///
    /// The parent tracker registered under `parent_tracker_id` is located or
    /// created with the global soft limit. The queue's own tracker is a
    /// child of it, keyed `"{parent_tracker_id}-{prefix}"` with the local
    /// soft limit, so repeated construction for the same tablet reuses the
    /// same accounting.
    pub fn new(
        metric_ctx: &MetricContext,
        mem_trackers: &MemTrackerRegistry,
        parent_tracker_id: &str,
        config: QueueConfig,
    ) -> Self {
        let parent_tracker =
            mem_trackers.find_or_create(config.global_soft_limit_bytes, parent_tracker_id, None);

        let tracker = mem_trackers.find_or_create(
            config.local_soft_limit_bytes,
            &format!("{}-{}", parent_tracker_id, metric_ctx.prefix()),
            Some(&parent_tracker),
        );

        Self {
            inner: Mutex::new(Inner {
                state: QueueState::Open,
                messages: BTreeMap::new(),
                watermarks: BTreeMap::new(),
            }),
            parent_tracker,
            tracker,
            metrics: QueueMetrics::new(metric_ctx),
            local_hard_limit_bytes: config.local_hard_limit_bytes,
            global_hard_limit_bytes: config.global_hard_limit_bytes,
            max_batch_size_bytes: config.max_batch_size_bytes,
            dump_on_full: config.dump_on_full,
        }
    }

    /// Start tracking acknowledgements from `uuid`, with all three
    /// watermarks at `initial_watermark`.
    pub fn track_peer(&self, uuid: &str, initial_watermark: OpId) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        debug_assert_eq!(QueueState::Open, inner.state);

        if inner.watermarks.contains_key(uuid) {
            return Err(QueueError::PeerAlreadyTracked { uuid: uuid.to_string() });
        }

        inner.watermarks.insert(uuid.to_string(), PeerWatermarks::new_initial(initial_watermark));
        Ok(())
    }

    /// Stop tracking `uuid`. A no-op if the peer is unknown.
    ///
    /// Acknowledgements the peer already recorded on queued operations are
    /// left as they are.
    pub fn untrack_peer(&self, uuid: &str) {
        let mut inner = self.inner.lock();
        inner.watermarks.remove(uuid);
    }

    /// Append an operation to the queue.
    ///
    /// If a soft limit is exceeded the all-done prefix is trimmed first. A
    /// replicate that still cannot fit under the hard limits is refused with
    /// [`QueueError::QueueFull`]; a commit is always admitted, since losing
    /// it would stall commit progress on the followers.
    pub fn append_operation(&self, status: Arc<OperationStatusTracker>) -> Result<(), QueueError> {
        let res = self.do_append_operation(status);

        // The dump is advisory and is captured only after the queue lock has
        // been released; it may observe appends that slipped in meanwhile.
        if res.is_err() && self.dump_on_full {
            tracing::info!("queue full, dumping state");
            let mut dump = Vec::new();
            self.dump_to_strings(&mut dump);
            for line in dump {
                tracing::info!("{}", line);
            }
        }

        res
    }

    fn do_append_operation(&self, status: Arc<OperationStatusTracker>) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        debug_assert_eq!(QueueState::Open, inner.state);

        // Once either the local or the global soft limit is exceeded, try to
        // trim the queue first.
        if self.tracker.any_limit_exceeded() {
            self.trim_buffer_for_message(&mut inner, status.operation())?;
        }

        // Getting here means either trimming made room under the soft
        // limits, or it could not but the hard limits still hold, or the
        // operation is a commit.
        let bytes = status.operation().byte_size();
        self.metrics.queue_size_bytes.increment_by(bytes as i64);
        self.tracker.consume(bytes);

        tracing::trace!(op = %status.operation(), status = %status, "appended operation to queue");

        let id = status.id();
        let prev = inner.messages.insert(id, Arc::clone(&status));
        assert!(prev.is_none(), "duplicate op id appended to queue: {}", id);

        self.metrics.total_num_ops.increment();

        // Entries may arrive pre-acked: in tests, or when replicating only
        // to learners.
        if status.is_all_done() {
            self.metrics.num_all_done_ops.increment();
        } else if status.is_done() {
            self.metrics.num_majority_done_ops.increment();
        } else {
            self.metrics.num_in_progress_ops.increment();
        }

        Ok(())
    }

    /// Trim the all-done prefix until `operation` fits under this queue's
    /// soft limit.
    ///
    /// Trimming stops at the first entry some peer still needs; no gap is
    /// ever created. When trimming cannot make room the operation is still
    /// admitted if the hard limits hold, and unconditionally if it is a
    /// commit.
    fn trim_buffer_for_message(
        &self,
        inner: &mut Inner,
        operation: &Operation,
    ) -> Result<(), QueueError> {
        let bytes = operation.byte_size();

        while bytes > self.tracker.spare_capacity() {
            // This queue may be empty while the global limit is violated by
            // the other queues' consumption.
            let head_trimmable =
                inner.messages.first_key_value().map_or(false, |(_, ost)| ost.is_all_done());

            if !head_trimmable {
                if self.check_hard_limits_not_violated(bytes) || operation.kind() == OpKind::Commit {
                    return Ok(());
                }
                return Err(QueueError::QueueFull);
            }

            let (_, ost) = inner.messages.pop_first().expect("head entry exists");
            let bytes_to_decrement = ost.operation().byte_size();
            self.metrics.total_num_ops.decrement();
            self.metrics.num_all_done_ops.decrement();
            self.metrics.queue_size_bytes.decrement_by(bytes_to_decrement as i64);
            self.tracker.release(bytes_to_decrement);
        }

        Ok(())
    }

    /// True iff appending `bytes` keeps both this queue and the server-wide
    /// consumption under their hard limits.
    ///
    /// The parent read may be stale relative to sibling queues; the
    /// soft/hard separation tolerates that.
    fn check_hard_limits_not_violated(&self, bytes: u64) -> bool {
        let local_ok = bytes + self.tracker.consumption() <= self.local_hard_limit_bytes;
        let global_ok = bytes + self.parent_tracker.consumption() <= self.global_hard_limit_bytes;
        local_ok && global_ok
    }

    /// Assemble the next batch for `uuid` into `request`, starting just past
    /// the peer's `received` watermark.
    ///
    /// The batch is capped at `max_batch_size_bytes`. A single operation is
    /// allowed to overflow the cap, otherwise an oversized op would never be
    /// sent. The request holds shared-ownership handles; the queue keeps
    /// owning the entries.
    pub fn request_for_peer(&self, uuid: &str, request: &mut PeerRequest) {
        request.clear_ops();

        let inner = self.inner.lock();
        debug_assert_eq!(QueueState::Open, inner.state);

        let watermarks = inner.watermarks.get(uuid).expect("requesting batch for untracked peer");

        for (_, ost) in inner
            .messages
            .range((Bound::Excluded(watermarks.received), Bound::Unbounded))
        {
            request.attach(Arc::clone(ost));

            if request.byte_size() > self.max_batch_size_bytes {
                if request.ops_size() > 1 {
                    request.detach_last();
                }
                tracing::trace!(
                    peer = uuid,
                    ops = request.ops_size(),
                    bytes = request.byte_size(),
                    max = self.max_batch_size_bytes,
                    "request reached max batch size for peer"
                );
                break;
            }
        }

        match request.id_range() {
            Some((first, last)) => {
                tracing::trace!(
                    peer = uuid,
                    ops = request.ops_size(),
                    from = %first,
                    to = %last,
                    "sending request with operations to peer"
                );
            }
            None => {
                tracing::trace!(peer = uuid, "sending status only request to peer");
            }
        }
    }

    /// Apply the watermarks a peer reported back.
    ///
    /// Acks every entry that newly falls under the peer's replicated or
    /// safe-commit watermark, by the entry's kind, and moves entries between
    /// the metric buckets on done/all-done transitions. The stored watermark
    /// record is replaced with `new_status`.
    ///
    /// Returns whether entries above the peer's new `received` watermark
    /// remain queued. A response from an untracked peer, or on a closed
    /// queue, is disregarded with a warning and returns `false`.
    pub fn response_from_peer(&self, uuid: &str, new_status: &PeerWatermarks) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let current = match inner.watermarks.get(uuid) {
            Some(w) if inner.state == QueueState::Open => *w,
            _ => {
                tracing::warn!(peer = uuid, "queue is closed or peer was untracked, disregarding peer response");
                return false;
            }
        };

        debug_assert!(new_status.validate().is_ok(), "invalid watermarks: {}", new_status);

        // Watermarks only advance; the consensus driver guarantees it.
        debug_assert!(
            new_status.received >= current.received
                && new_status.replicated >= current.replicated
                && new_status.safe_commit >= current.safe_commit,
            "peer {} watermarks regressed: {} -> {}",
            uuid,
            current,
            new_status
        );

        tracing::trace!(peer = uuid, current = %current, new = %new_status, "received response from peer");

        // Replicates and commits are acknowledged on separate watermarks
        // (commits are executed asynchronously on the followers), so the
        // scan starts at the lowest of the two and checks each entry against
        // the window of its own kind.
        let lowest = current.lowest_acked();
        for (id, ost) in inner
            .messages
            .range((Bound::Excluded(lowest), Bound::Included(new_status.received)))
        {
            let id = *id;
            let was_done = ost.is_done();
            let was_all_done = ost.is_all_done();

            match ost.operation().kind() {
                OpKind::Commit => {
                    if current.safe_commit < id && id <= new_status.safe_commit {
                        ost.ack_peer(uuid);
                    }
                }
                OpKind::Replicate => {
                    if current.replicated < id && id <= new_status.replicated {
                        ost.ack_peer(uuid);
                    }
                }
            }

            if ost.is_all_done() && !was_all_done {
                self.metrics.num_all_done_ops.increment();
                self.metrics.num_majority_done_ops.decrement();
            }
            if ost.is_done() && !was_done {
                self.metrics.num_majority_done_ops.increment();
                self.metrics.num_in_progress_ops.decrement();
            }
        }

        inner.watermarks.insert(uuid.to_string(), *new_status);

        inner
            .messages
            .range((Bound::Excluded(new_status.received), Bound::Unbounded))
            .next()
            .is_some()
    }

    /// Fetch the status tracker for `op_id`, sharing its ownership with the
    /// queue.
    pub fn get_operation_status(
        &self,
        op_id: &OpId,
    ) -> Result<Arc<OperationStatusTracker>, QueueError> {
        let inner = self.inner.lock();
        inner
            .messages
            .get(op_id)
            .map(Arc::clone)
            .ok_or(QueueError::OperationNotFound { op_id: *op_id })
    }

    /// Close the queue: drop all watermark records and refuse further
    /// appends and responses.
    ///
    /// Status trackers stay alive through their remaining shared owners and
    /// are dropped when those owners release them.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.state = QueueState::Closed;
        inner.watermarks.clear();
    }

    /// Bytes of queued operations currently charged to this queue's
    /// tracker.
    pub fn queued_size_bytes(&self) -> u64 {
        self.tracker.consumption()
    }
}

impl Display for PeerMessageQueue {
    /// One-line metrics summary.
    ///
    /// The gauges are thread-safe on their own; the lock makes the snapshot
    /// consistent.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let _guard = self.inner.lock();
        write!(
            f,
            "Consensus queue metrics: Total Ops: {}, All Done Ops: {}, Only Majority Done Ops: {}, In Progress Ops: {}, Queue Size (bytes): {}/{}",
            self.metrics.total_num_ops.value(),
            self.metrics.num_all_done_ops.value(),
            self.metrics.num_majority_done_ops.value(),
            self.metrics.num_in_progress_ops.value(),
            self.metrics.queue_size_bytes.value(),
            self.local_hard_limit_bytes
        )
    }
}

impl Drop for PeerMessageQueue {
    fn drop(&mut self) {
        self.close();
    }
}
