use std::sync::Arc;

use crate::OpId;
use crate::OperationStatusTracker;

/// Fixed serialization overhead of a request envelope.
pub(crate) const REQUEST_OVERHEAD_BYTES: u64 = 16;

/// Per-operation framing overhead.
pub(crate) const OP_OVERHEAD_BYTES: u64 = 8;

/// Builder for one outbound batch to a single peer.
///
/// Attached operations are shared-ownership handles onto entries the queue
/// keeps owning: clearing or shrinking the request drops handles, never
/// payloads. A transport may hold the filled request across the queue lock,
/// and across `close()`, without copying operation bytes.
pub struct PeerRequest {
    ops: Vec<Arc<OperationStatusTracker>>,
    byte_size: u64,
}

impl PeerRequest {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            byte_size: REQUEST_OVERHEAD_BYTES,
        }
    }

    /// Drop all attached handles.
    pub fn clear_ops(&mut self) {
        self.ops.clear();
        self.byte_size = REQUEST_OVERHEAD_BYTES;
    }

    pub(crate) fn attach(&mut self, op: Arc<OperationStatusTracker>) {
        self.byte_size += OP_OVERHEAD_BYTES + op.operation().byte_size();
        self.ops.push(op);
    }

    pub(crate) fn detach_last(&mut self) {
        if let Some(op) = self.ops.pop() {
            self.byte_size -= OP_OVERHEAD_BYTES + op.operation().byte_size();
        }
    }

    pub fn ops(&self) -> &[Arc<OperationStatusTracker>] {
        &self.ops
    }

    pub fn ops_size(&self) -> usize {
        self.ops.len()
    }

    /// Estimated serialized size of the request as currently assembled.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Ids of the first and last attached op, for log lines.
    pub(crate) fn id_range(&self) -> Option<(OpId, OpId)> {
        Some((self.ops.first()?.id(), self.ops.last()?.id()))
    }
}

impl Default for PeerRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::request::PeerRequest;
    use crate::request::OP_OVERHEAD_BYTES;
    use crate::request::REQUEST_OVERHEAD_BYTES;
    use crate::OpId;
    use crate::Operation;
    use crate::OperationStatusTracker;

    fn tracked_op(index: u64, bytes: usize) -> Arc<OperationStatusTracker> {
        let op = Operation::replicate(OpId::new(1, index), vec![0u8; bytes]);
        Arc::new(OperationStatusTracker::new(op, 1, 1))
    }

    #[test]
    fn test_byte_size_tracks_attach_and_detach() {
        let mut request = PeerRequest::new();
        assert_eq!(REQUEST_OVERHEAD_BYTES, request.byte_size());

        request.attach(tracked_op(1, 100));
        request.attach(tracked_op(2, 50));
        assert_eq!(REQUEST_OVERHEAD_BYTES + 2 * OP_OVERHEAD_BYTES + 150, request.byte_size());
        assert_eq!(2, request.ops_size());

        request.detach_last();
        assert_eq!(REQUEST_OVERHEAD_BYTES + OP_OVERHEAD_BYTES + 100, request.byte_size());
        assert_eq!(1, request.ops_size());
    }

    #[test]
    fn test_clear_ops_drops_handles_only() {
        let op = tracked_op(1, 10);
        let mut request = PeerRequest::new();
        request.attach(Arc::clone(&op));
        assert_eq!(2, Arc::strong_count(&op));

        request.clear_ops();
        assert_eq!(REQUEST_OVERHEAD_BYTES, request.byte_size());
        assert_eq!(0, request.ops_size());
        // The operation itself is still alive through the original handle.
        assert_eq!(1, Arc::strong_count(&op));
        assert_eq!(10, op.operation().byte_size());
    }

    #[test]
    fn test_id_range() {
        let mut request = PeerRequest::new();
        assert_eq!(None, request.id_range());

        request.attach(tracked_op(3, 1));
        request.attach(tracked_op(4, 1));
        assert_eq!(Some((OpId::new(1, 3), OpId::new(1, 4))), request.id_range());
    }
}
