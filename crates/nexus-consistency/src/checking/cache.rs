//! Per-node cache and ownership marks
//!
//! Both structures are sized once from a store's high id and then updated
//! by every worker with single-slot atomics. All updates are commutative
//! (bit-set, add), so no lock is taken and the final state does not depend
//! on the order in which queues ran.
//!
//! ```text
//! node id ─> NodeCell { first_rel, flags, observed degree, expected degree }
//!              ▲ node stage fills        ▲ relationship stage adds
//! ```

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use crate::store::{NULL_REFERENCE, NodeRecord};

const IN_USE: u8 = 1;
const DENSE: u8 = 1 << 1;
const FIRST_REL_CONFIRMED: u8 = 1 << 2;

#[derive(Debug)]
struct NodeCell {
    first_rel: AtomicU64,
    flags: AtomicU8,
    observed_degree: AtomicU64,
    expected_degree: AtomicU64,
}

impl NodeCell {
    fn new() -> Self {
        Self {
            first_rel: AtomicU64::new(NULL_REFERENCE),
            flags: AtomicU8::new(0),
            observed_degree: AtomicU64::new(0),
            expected_degree: AtomicU64::new(0),
        }
    }

    fn has(&self, flag: u8) -> bool {
        self.flags.load(Ordering::Acquire) & flag != 0
    }
}

/// Snapshot of one node cell, read by the post-scan sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCacheEntry {
    /// Node id
    pub node: u64,
    /// Node was in use during the node stage
    pub in_use: bool,
    /// Node is dense
    pub dense: bool,
    /// First relationship (or group) pointer of the node
    pub first_rel: u64,
    /// A relationship stage worker saw the first relationship claim this node
    pub first_rel_confirmed: bool,
    /// Relationships seen touching the node
    pub observed_degree: u64,
    /// Sum of chain lengths stored in the node's chain heads
    pub expected_degree: u64,
}

/// Node cells indexed by node id
///
/// Ids at or beyond the node high id have no cell and read as not in use.
#[derive(Debug)]
pub struct CacheAccess {
    cells: Vec<NodeCell>,
}

impl CacheAccess {
    /// Cache for node ids `0..node_high_id`
    pub fn new(node_high_id: u64) -> Self {
        Self {
            cells: (0..node_high_id).map(|_| NodeCell::new()).collect(),
        }
    }

    /// Allocated cells
    pub fn len(&self) -> u64 {
        self.cells.len() as u64
    }

    /// No cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn cell(&self, node: u64) -> Option<&NodeCell> {
        usize::try_from(node).ok().and_then(|i| self.cells.get(i))
    }

    /// Record what the node stage read
    pub fn put_node(&self, node: &NodeRecord) {
        if let Some(cell) = self.cell(node.id) {
            cell.first_rel.store(node.next_rel, Ordering::Release);
            let mut flags = 0;
            if node.in_use {
                flags |= IN_USE;
            }
            if node.dense {
                flags |= DENSE;
            }
            cell.flags.fetch_or(flags, Ordering::AcqRel);
        }
    }

    /// Node was in use during the node stage
    pub fn in_use(&self, node: u64) -> bool {
        self.cell(node).is_some_and(|c| c.has(IN_USE))
    }

    /// Node is dense
    pub fn is_dense(&self, node: u64) -> bool {
        self.cell(node).is_some_and(|c| c.has(DENSE))
    }

    /// First relationship (or group) pointer of the node
    pub fn first_rel(&self, node: u64) -> u64 {
        self.cell(node)
            .map(|c| c.first_rel.load(Ordering::Acquire))
            .unwrap_or(NULL_REFERENCE)
    }

    /// A chain head claiming this node matched its first relationship
    pub fn confirm_first_rel(&self, node: u64) {
        if let Some(cell) = self.cell(node) {
            cell.flags.fetch_or(FIRST_REL_CONFIRMED, Ordering::AcqRel);
        }
    }

    /// One more relationship seen touching the node
    pub fn increment_degree(&self, node: u64) {
        if let Some(cell) = self.cell(node) {
            cell.observed_degree.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Chain length found in one of the node's chain heads
    pub fn add_expected_degree(&self, node: u64, length: u64) {
        if let Some(cell) = self.cell(node) {
            cell.expected_degree.fetch_add(length, Ordering::Relaxed);
        }
    }

    /// Snapshot of a cell
    pub fn entry(&self, node: u64) -> Option<NodeCacheEntry> {
        self.cell(node).map(|cell| {
            let flags = cell.flags.load(Ordering::Acquire);
            NodeCacheEntry {
                node,
                in_use: flags & IN_USE != 0,
                dense: flags & DENSE != 0,
                first_rel: cell.first_rel.load(Ordering::Acquire),
                first_rel_confirmed: flags & FIRST_REL_CONFIRMED != 0,
                observed_degree: cell.observed_degree.load(Ordering::Relaxed),
                expected_degree: cell.expected_degree.load(Ordering::Relaxed),
            }
        })
    }
}

/// One bit per record id
///
/// Used to record ownership: whoever marks an id second learns that the
/// record already has an owner.
#[derive(Debug)]
pub struct RecordMarks {
    words: Vec<AtomicU64>,
    len: u64,
}

impl RecordMarks {
    /// Marks for ids `0..high_id`
    pub fn new(high_id: u64) -> Self {
        let words = high_id.div_ceil(64);
        Self {
            words: (0..words).map(|_| AtomicU64::new(0)).collect(),
            len: high_id,
        }
    }

    /// Mark an id; returns true if it was already marked. Ids outside the
    /// range are never marked.
    pub fn mark(&self, id: u64) -> bool {
        if id >= self.len {
            return false;
        }
        let bit = 1u64 << (id % 64);
        let previous = self.words[(id / 64) as usize].fetch_or(bit, Ordering::AcqRel);
        previous & bit != 0
    }

    /// Id has been marked
    pub fn is_marked(&self, id: u64) -> bool {
        if id >= self.len {
            return false;
        }
        let bit = 1u64 << (id % 64);
        self.words[(id / 64) as usize].load(Ordering::Acquire) & bit != 0
    }

    /// Ids covered
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Covers no ids
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NodeLabels, Record};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_node_and_flags() {
        let cache = CacheAccess::new(10);
        cache.put_node(&NodeRecord {
            id: 3,
            in_use: true,
            dense: true,
            next_rel: 7,
            next_prop: NULL_REFERENCE,
            labels: NodeLabels::Inline(vec![]),
        });
        assert!(cache.in_use(3));
        assert!(cache.is_dense(3));
        assert_eq!(cache.first_rel(3), 7);
        assert!(!cache.in_use(4));
        assert!(!cache.in_use(1_000));
        assert_eq!(cache.first_rel(1_000), NULL_REFERENCE);
    }

    #[test]
    fn test_concurrent_degree_updates_commute() {
        let cache = Arc::new(CacheAccess::new(4));
        cache.put_node(&NodeRecord {
            in_use: true,
            ..NodeRecord::unused(2)
        });
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        cache.increment_degree(2);
                    }
                    cache.add_expected_degree(2, 1_000);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let entry = cache.entry(2).unwrap();
        assert_eq!(entry.observed_degree, 8_000);
        assert_eq!(entry.expected_degree, 8_000);
        assert!(!entry.first_rel_confirmed);
    }

    #[test]
    fn test_marks_report_second_owner() {
        let marks = RecordMarks::new(130);
        assert!(!marks.mark(129));
        assert!(marks.mark(129));
        assert!(marks.is_marked(129));
        assert!(!marks.is_marked(0));
        assert!(!marks.mark(500));
        assert!(!marks.is_marked(500));
    }
}
