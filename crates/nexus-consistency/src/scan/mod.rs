//! Record scanning, distribution and the worker pool
//!
//! ```text
//! BoundedIterable ──> SequentialRecordScanner ──> RecordProcessor
//!
//! BoundedIterable ──> ParallelRecordScanner
//!                       │ QueueDistributor picks queue(s)
//!                       ▼
//!                     RecordDistributor ──bounded──> Workers[0..N] ──> RecordProcessor
//! ```
//!
//! Within one queue records are processed in the order they were sent.
//! Nothing is guaranteed across queues.

pub mod distributor;
pub mod parallel;
pub mod sequential;
pub mod workers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

pub use distributor::{
    QueueDistributor, RelationshipNodesQueueDistributor, RoundRobinQueueDistributor,
};
pub use parallel::{ParallelRecordScanner, WorkerSettings};
pub use sequential::SequentialRecordScanner;
pub use workers::{InitSequencer, WorkerState, Workers};

/// Per-record work executed by a scanner or a worker
pub trait RecordProcessor<R>: Send + Sync {
    /// Called once per worker before its first record, in worker id order
    fn init(&self, _worker_id: usize) {}

    /// Process one record
    fn process(&self, record: &R, scope: &QueueScope) -> Result<()>;

    /// Called exactly once after every worker finished
    fn close(&self) {}
}

/// Which endpoint nodes a queue is responsible for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    All,
    NodeRange {
        nodes_per_queue: u64,
        queue_count: usize,
    },
}

/// The queue a record was delivered to, and what that queue owns
///
/// A relationship delivered to two queues is processed by both; each side
/// of it is handled only by the queue owning that side's node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueScope {
    queue: usize,
    ownership: Ownership,
}

impl QueueScope {
    /// Queue that owns every node
    pub fn all(queue: usize) -> Self {
        Self {
            queue,
            ownership: Ownership::All,
        }
    }

    /// Queue owning the node id range assigned by the relationship distributor
    pub fn node_range(queue: usize, nodes_per_queue: u64, queue_count: usize) -> Self {
        Self {
            queue,
            ownership: Ownership::NodeRange {
                nodes_per_queue,
                queue_count,
            },
        }
    }

    /// Queue index
    pub fn queue(&self) -> usize {
        self.queue
    }

    /// True when this queue handles per-node work for `node`
    pub fn owns_node(&self, node: u64) -> bool {
        match self.ownership {
            Ownership::All => true,
            Ownership::NodeRange {
                nodes_per_queue,
                queue_count,
            } => {
                distributor::queue_for_node(node, nodes_per_queue, queue_count) == self.queue
            }
        }
    }
}

/// Idempotent stop signal checked at every record boundary
#[derive(Debug, Clone, Default)]
pub struct StopControl {
    stopped: Arc<AtomicBool>,
}

impl StopControl {
    /// New, not stopped
    pub fn new() -> Self {
        Self::default()
    }

    /// Request stop; repeated calls have no further effect
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            tracing::info!("Consistency check stop requested");
        }
    }

    /// Stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scope_owns_everything() {
        let scope = QueueScope::all(3);
        assert!(scope.owns_node(0));
        assert!(scope.owns_node(u64::MAX));
        assert_eq!(scope.queue(), 3);
    }

    #[test]
    fn test_node_range_scope() {
        let first = QueueScope::node_range(0, 10, 3);
        let last = QueueScope::node_range(2, 10, 3);
        assert!(first.owns_node(9));
        assert!(!first.owns_node(10));
        assert!(last.owns_node(25));
        assert!(last.owns_node(1_000));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let stop = StopControl::new();
        let clone = stop.clone();
        assert!(!clone.is_stopped());
        stop.stop();
        stop.stop();
        assert!(clone.is_stopped());
    }
}
