//! The gauges a queue exports.
//!
//! Five gauges describe a queue: `total_num_ops`, `num_all_done_ops`,
//! `num_majority_done_ops`, `num_in_progress_ops` and `queue_size_bytes`.
//! They are registered under the queue's metric prefix in a shared registry,
//! so an operator surface can read every tablet's queue from one place.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

/// A 64-bit gauge backed by an atomic counter.
///
/// Gauges are thread-safe on their own; the queue additionally updates them
/// under its lock so that a snapshot of all five is internally consistent.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn increment(&self) {
        self.increment_by(1);
    }

    pub fn decrement(&self) {
        self.decrement_by(1);
    }

    pub fn increment_by(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn decrement_by(&self, delta: i64) {
        self.value.fetch_sub(delta, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Shared name-to-gauge table. Handles are created at zero on first use and
/// never dropped.
#[derive(Default)]
pub struct MetricRegistry {
    gauges: Mutex<BTreeMap<String, Arc<Gauge>>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the gauge registered under `name`, creating it if absent.
    pub fn gauge(&self, name: &str) -> Arc<Gauge> {
        let mut gauges = self.gauges.lock();
        if let Some(g) = gauges.get(name) {
            return Arc::clone(g);
        }

        let gauge = Arc::new(Gauge::default());
        gauges.insert(name.to_string(), Arc::clone(&gauge));
        gauge
    }
}

/// Where a component registers its gauges: a shared registry plus the
/// component's name prefix, typically the tablet id.
#[derive(Clone)]
pub struct MetricContext {
    registry: Arc<MetricRegistry>,
    prefix: String,
}

impl MetricContext {
    pub fn new(registry: Arc<MetricRegistry>, prefix: impl Into<String>) -> Self {
        Self {
            registry,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn gauge(&self, name: &str) -> Arc<Gauge> {
        self.registry.gauge(&format!("{}.{}", self.prefix, name))
    }
}

/// The five gauges describing a peer message queue.
pub(crate) struct QueueMetrics {
    /// Total number of queued operations in the leader queue.
    pub(crate) total_num_ops: Arc<Gauge>,

    /// Operations ack'd by all peers.
    pub(crate) num_all_done_ops: Arc<Gauge>,

    /// Operations ack'd by a majority but not all peers.
    pub(crate) num_majority_done_ops: Arc<Gauge>,

    /// Operations ack'd by a minority of peers.
    pub(crate) num_in_progress_ops: Arc<Gauge>,

    /// Size of the leader queue, in bytes.
    pub(crate) queue_size_bytes: Arc<Gauge>,
}

impl QueueMetrics {
    pub(crate) fn new(metric_ctx: &MetricContext) -> Self {
        Self {
            total_num_ops: metric_ctx.gauge("total_num_ops"),
            num_all_done_ops: metric_ctx.gauge("num_all_done_ops"),
            num_majority_done_ops: metric_ctx.gauge("num_majority_done_ops"),
            num_in_progress_ops: metric_ctx.gauge("num_in_progress_ops"),
            queue_size_bytes: metric_ctx.gauge("queue_size_bytes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::metrics::MetricContext;
    use crate::metrics::MetricRegistry;

    #[test]
    fn test_gauge_arithmetic() {
        let registry = MetricRegistry::new();
        let gauge = registry.gauge("g");

        gauge.increment();
        gauge.increment_by(10);
        gauge.decrement();
        gauge.decrement_by(3);
        assert_eq!(7, gauge.value());
    }

    #[test]
    fn test_registry_returns_same_instance() {
        let registry = MetricRegistry::new();
        let a = registry.gauge("g");
        let b = registry.gauge("g");

        a.increment();
        assert_eq!(1, b.value());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_context_prefixes_names() {
        let registry = Arc::new(MetricRegistry::new());
        let ctx = MetricContext::new(Arc::clone(&registry), "tablet-1");
        assert_eq!("tablet-1", ctx.prefix());

        ctx.gauge("total_num_ops").increment();
        assert_eq!(1, registry.gauge("tablet-1.total_num_ops").value());
    }
}
