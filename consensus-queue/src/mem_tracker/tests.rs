use std::sync::Arc;
use std::thread;

use crate::mem_tracker::MemTrackerRegistry;

#[test]
fn test_consume_and_release_forward_to_parent() {
    let registry = MemTrackerRegistry::new();
    let parent = registry.find_or_create(1000, "parent", None);
    let child = registry.find_or_create(100, "child", Some(&parent));

    child.consume(60);
    assert_eq!(60, child.consumption());
    assert_eq!(60, parent.consumption());

    child.consume(50);
    assert_eq!(110, child.consumption());
    assert_eq!(110, parent.consumption());

    child.release(100);
    assert_eq!(10, child.consumption());
    assert_eq!(10, parent.consumption());
}

#[test]
fn test_any_limit_exceeded_checks_ancestors() {
    let registry = MemTrackerRegistry::new();
    let parent = registry.find_or_create(100, "parent", None);
    let child_a = registry.find_or_create(1000, "child-a", Some(&parent));
    let child_b = registry.find_or_create(1000, "child-b", Some(&parent));

    child_a.consume(80);
    assert!(!child_a.any_limit_exceeded());
    assert!(!child_b.any_limit_exceeded());

    // A sibling pushes the shared parent over its soft limit.
    child_b.consume(80);
    assert!(child_a.any_limit_exceeded());
    assert!(child_b.any_limit_exceeded());
    assert!(parent.any_limit_exceeded());

    child_b.release(80);
    assert!(!child_a.any_limit_exceeded());
}

#[test]
fn test_spare_capacity_saturates() {
    let registry = MemTrackerRegistry::new();
    let tracker = registry.find_or_create(100, "t", None);

    assert_eq!(100, tracker.spare_capacity());
    tracker.consume(70);
    assert_eq!(30, tracker.spare_capacity());
    tracker.consume(70);
    assert_eq!(0, tracker.spare_capacity());
}

#[test]
fn test_find_or_create_is_idempotent() {
    let registry = MemTrackerRegistry::new();
    let first = registry.find_or_create(100, "shared", None);
    // The second caller's limit is ignored; the registered instance wins.
    let second = registry.find_or_create(999, "shared", None);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(100, second.soft_limit());

    let found = registry.find("shared").unwrap();
    assert!(Arc::ptr_eq(&first, &found));
    assert!(registry.find("absent").is_none());
}

#[test]
fn test_concurrent_consume_on_shared_parent() {
    let registry = Arc::new(MemTrackerRegistry::new());
    let parent = registry.find_or_create(u64::MAX, "parent", None);

    let n_threads: u64 = 8;
    let n_ops: u64 = 1000;

    let mut handles = Vec::new();
    for i in 0..n_threads {
        let registry = Arc::clone(&registry);
        let parent = registry.find_or_create(u64::MAX, "parent", None);
        let child = registry.find_or_create(u64::MAX, &format!("child-{}", i), Some(&parent));
        handles.push(thread::spawn(move || {
            for _ in 0..n_ops {
                child.consume(1);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(n_threads * n_ops, parent.consumption());
}
