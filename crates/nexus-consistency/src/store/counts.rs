//! Counts store boundary
//!
//! The counts store keeps precomputed node and relationship counts per
//! label / type combination. `None` in a key position means "any".

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Key of one counts entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CountsKey {
    /// Nodes with a label, or all nodes
    Node {
        /// Label filter
        label: Option<u32>,
    },
    /// Relationships by (start label, type, end label)
    Relationship {
        /// Start node label filter
        start_label: Option<u32>,
        /// Type filter
        rel_type: Option<u32>,
        /// End node label filter
        end_label: Option<u32>,
    },
}

impl CountsKey {
    /// Node count key
    pub fn node(label: Option<u32>) -> Self {
        Self::Node { label }
    }

    /// Relationship count key
    pub fn relationship(
        start_label: Option<u32>,
        rel_type: Option<u32>,
        end_label: Option<u32>,
    ) -> Self {
        Self::Relationship {
            start_label,
            rel_type,
            end_label,
        }
    }

    /// True for node keys
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node { .. })
    }
}

fn token(f: &mut fmt::Formatter<'_>, value: Option<u32>) -> fmt::Result {
    match value {
        Some(id) => write!(f, "{}", id),
        None => write!(f, "*"),
    }
}

impl fmt::Display for CountsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node { label } => {
                write!(f, "(:")?;
                token(f, *label)?;
                write!(f, ")")
            }
            Self::Relationship {
                start_label,
                rel_type,
                end_label,
            } => {
                write!(f, "(:")?;
                token(f, *start_label)?;
                write!(f, ")-[:")?;
                token(f, *rel_type)?;
                write!(f, "]->(:")?;
                token(f, *end_label)?;
                write!(f, ")")
            }
        }
    }
}

/// Read access to stored counts
pub trait CountsStore: Send + Sync {
    /// Every stored entry in key order
    fn entries(&self) -> Vec<(CountsKey, u64)>;

    /// Stored count for a key, zero when absent
    fn get(&self, key: &CountsKey) -> u64;
}

/// Counts store backed by a map
#[derive(Debug, Default)]
pub struct MemoryCountsStore {
    counts: RwLock<BTreeMap<CountsKey, u64>>,
}

impl MemoryCountsStore {
    /// Create an empty counts store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to a key
    pub fn increment(&self, key: CountsKey, delta: u64) {
        *self.counts.write().entry(key).or_insert(0) += delta;
    }

    /// Overwrite a key; zero removes it
    pub fn set(&self, key: CountsKey, count: u64) {
        let mut counts = self.counts.write();
        if count == 0 {
            counts.remove(&key);
        } else {
            counts.insert(key, count);
        }
    }
}

impl CountsStore for MemoryCountsStore {
    fn entries(&self) -> Vec<(CountsKey, u64)> {
        self.counts.read().iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn get(&self, key: &CountsKey) -> u64 {
        self.counts.read().get(key).copied().unwrap_or(0)
    }
}
