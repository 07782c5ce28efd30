//! Error types exposed by this crate.

use crate::OpId;

/// Errors returned by the peer message queue.
///
/// Programming errors, such as appending a duplicate op id or driving a
/// closed queue, are not represented here: they are assertions, fatal in
/// debug builds.
#[derive(Debug, Clone, thiserror::Error)]
#[derive(PartialEq, Eq)]
pub enum QueueError {
    /// A replicate operation cannot be admitted without violating a hard
    /// limit, and nothing at the head of the queue is trimmable.
    ///
    /// The consensus layer above is expected to back-pressure its client.
    #[error("Cannot append replicate message. Queue is full.")]
    QueueFull,

    /// The queue holds no operation with the given id.
    #[error("Operation {op_id} is not in the queue.")]
    OperationNotFound { op_id: OpId },

    /// `track_peer` was called twice for the same peer.
    #[error("Peer {uuid} is already tracked.")]
    PeerAlreadyTracked { uuid: String },
}
