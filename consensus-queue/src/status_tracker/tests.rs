use maplit::btreeset;
use pretty_assertions::assert_eq;

use crate::OpId;
use crate::Operation;
use crate::OperationStatusTracker;

fn replicate_op(index: u64) -> Operation {
    Operation::replicate(OpId::new(1, index), vec![0u8; 10])
}

fn commit_op(index: u64, committed: u64) -> Operation {
    Operation::commit(OpId::new(1, index), OpId::new(1, committed), vec![0u8; 4])
}

#[test]
fn test_ack_dispatches_by_kind() {
    let replicate = OperationStatusTracker::new(replicate_op(1), 1, 2);
    replicate.ack_peer("peer-a");
    assert_eq!(btreeset! {"peer-a".to_string()}, replicate.replicate_acks());
    assert_eq!(btreeset! {}, replicate.commit_acks());

    let commit = OperationStatusTracker::new(commit_op(2, 1), 1, 2);
    commit.ack_peer("peer-a");
    assert_eq!(btreeset! {}, commit.replicate_acks());
    assert_eq!(btreeset! {"peer-a".to_string()}, commit.commit_acks());
}

#[test]
fn test_ack_peer_is_idempotent() {
    let tracker = OperationStatusTracker::new(replicate_op(1), 2, 3);

    tracker.ack_peer("peer-a");
    tracker.ack_peer("peer-a");
    tracker.ack_peer("peer-a");

    assert_eq!(1, tracker.ack_count());
    assert!(!tracker.is_done());
}

#[test]
fn test_done_thresholds() {
    let tracker = OperationStatusTracker::new(replicate_op(1), 2, 3);
    assert!(!tracker.is_done());
    assert!(!tracker.is_all_done());

    tracker.ack_peer("peer-a");
    assert!(!tracker.is_done());

    tracker.ack_peer("peer-b");
    assert!(tracker.is_done());
    assert!(!tracker.is_all_done());

    tracker.ack_peer("peer-c");
    assert!(tracker.is_done());
    assert!(tracker.is_all_done());

    // All-done is monotone: re-acks change nothing.
    tracker.ack_peer("peer-b");
    assert!(tracker.is_all_done());
    assert_eq!(3, tracker.ack_count());
}

#[test]
fn test_zero_peers_is_immediately_all_done() {
    // Replicating only to learners: no voter has to ack anything.
    let tracker = OperationStatusTracker::new(replicate_op(1), 0, 0);
    assert!(tracker.is_done());
    assert!(tracker.is_all_done());
}

#[test]
fn test_tracker_display() {
    let tracker = OperationStatusTracker::new(replicate_op(1), 1, 2);
    tracker.ack_peer("peer-a");
    assert_eq!(
        "acked 1/2 (majority: 1, done: true, all done: false)",
        tracker.to_string()
    );
}

#[test]
fn test_accessors() {
    let tracker = OperationStatusTracker::new(commit_op(4, 2), 1, 1);
    assert_eq!(OpId::new(1, 4), tracker.id());
    assert_eq!(Some(OpId::new(1, 2)), tracker.operation().committed_op_id());
}
