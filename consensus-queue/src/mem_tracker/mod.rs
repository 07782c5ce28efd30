//! Two-tier memory accounting for consensus queues.
//!
//! Every queue owns a child tracker whose consumption forwards to a
//! process-wide parent shared by all queues. Soft limits steer opportunistic
//! trimming; the hard limits consulted at admission time are policy of the
//! queue itself, not of the trackers.

#[cfg(test)] mod tests;

use std::collections::BTreeMap;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

/// A node in the memory-tracker hierarchy.
///
/// Consumption lives in an atomic so that sibling queues can charge the
/// shared parent without serializing against each other. A reader of the
/// parent may observe a slightly stale value; callers that compare against
/// limits are expected to tolerate that.
pub struct MemTracker {
    id: String,
    soft_limit: u64,
    consumption: AtomicI64,
    parent: Option<Arc<MemTracker>>,
}

impl MemTracker {
    fn new(soft_limit: u64, id: &str, parent: Option<Arc<MemTracker>>) -> Self {
        Self {
            id: id.to_string(),
            soft_limit,
            consumption: AtomicI64::new(0),
            parent,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn soft_limit(&self) -> u64 {
        self.soft_limit
    }

    /// Current consumption of this node, including every descendant's share.
    pub fn consumption(&self) -> u64 {
        self.consumption.load(Ordering::Relaxed).max(0) as u64
    }

    /// Charge `bytes` to this node and all of its ancestors.
    pub fn consume(&self, bytes: u64) {
        self.consumption.fetch_add(bytes as i64, Ordering::Relaxed);
        let mut node = self.parent.as_deref();
        while let Some(t) = node {
            t.consumption.fetch_add(bytes as i64, Ordering::Relaxed);
            node = t.parent.as_deref();
        }
    }

    /// Return `bytes` to this node and all of its ancestors.
    pub fn release(&self, bytes: u64) {
        self.consumption.fetch_sub(bytes as i64, Ordering::Relaxed);
        let mut node = self.parent.as_deref();
        while let Some(t) = node {
            t.consumption.fetch_sub(bytes as i64, Ordering::Relaxed);
            node = t.parent.as_deref();
        }
    }

    /// True iff any node on the path from this one to the root exceeds its
    /// soft limit.
    pub fn any_limit_exceeded(&self) -> bool {
        let mut node = Some(self);
        while let Some(t) = node {
            if t.consumption() > t.soft_limit {
                return true;
            }
            node = t.parent.as_deref();
        }
        false
    }

    /// Headroom left under this node's own soft limit.
    pub fn spare_capacity(&self) -> u64 {
        self.soft_limit.saturating_sub(self.consumption())
    }
}

/// Registry of trackers by stable identifier.
///
/// One registry serves the whole process and is injected wherever a queue is
/// constructed; an id resolves to the same tracker instance for the life of
/// the registry.
#[derive(Default)]
pub struct MemTrackerRegistry {
    trackers: Mutex<BTreeMap<String, Arc<MemTracker>>>,
}

impl MemTrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the tracker registered under `id`, creating it with
    /// `soft_limit` and `parent` if absent.
    ///
    /// The limits of an already registered tracker are left untouched.
    pub fn find_or_create(
        &self,
        soft_limit: u64,
        id: &str,
        parent: Option<&Arc<MemTracker>>,
    ) -> Arc<MemTracker> {
        let mut trackers = self.trackers.lock();
        if let Some(t) = trackers.get(id) {
            return Arc::clone(t);
        }

        let tracker = Arc::new(MemTracker::new(soft_limit, id, parent.map(Arc::clone)));
        trackers.insert(id.to_string(), Arc::clone(&tracker));
        tracker
    }

    pub fn find(&self, id: &str) -> Option<Arc<MemTracker>> {
        self.trackers.lock().get(id).map(Arc::clone)
    }
}
