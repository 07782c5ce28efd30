//! The leader-side replication queue of a Raft-style tablet server.
//!
//! A tablet leader streams ordered operations (REPLICATE and COMMIT entries)
//! to each of its followers. This crate is the buffer in the middle: an
//! ordered log of in-flight operations keyed by [`OpId`], per-peer
//! acknowledgement watermarks, two-tier memory accounting with soft and hard
//! limits, and a batching policy that assembles bounded-size outbound
//! requests.
//!
//! The queue does not decide consensus: leader election, quorum commit
//! decisions and log durability belong to the layers around it. It consumes
//! opaque [`Operation`]s from the consensus driver, hands
//! [`PeerRequest`] batches to a transport, and applies the watermarks peers
//! report back.
//!
//! All public methods of [`PeerMessageQueue`] are safe to call from
//! concurrent threads; one short critical section per call is the whole
//! synchronization story.

#![allow(clippy::uninlined_format_args)]
#![deny(unused_qualifications)]

pub mod config;
pub mod error;
pub mod mem_tracker;
pub mod metrics;
pub mod op_id;
pub mod operation;
pub mod queue;
pub mod request;
pub mod status_tracker;
pub mod watermark;

pub use crate::config::ConfigError;
pub use crate::config::QueueConfig;
pub use crate::error::QueueError;
pub use crate::mem_tracker::MemTracker;
pub use crate::mem_tracker::MemTrackerRegistry;
pub use crate::metrics::Gauge;
pub use crate::metrics::MetricContext;
pub use crate::metrics::MetricRegistry;
pub use crate::op_id::OpId;
pub use crate::operation::OpKind;
pub use crate::operation::OpPayload;
pub use crate::operation::Operation;
pub use crate::queue::PeerMessageQueue;
pub use crate::request::PeerRequest;
pub use crate::status_tracker::OperationStatusTracker;
pub use crate::watermark::PeerWatermarks;

/// Identifier of a replication peer, a node uuid assigned by the cluster
/// metadata subsystem.
pub type PeerId = String;
