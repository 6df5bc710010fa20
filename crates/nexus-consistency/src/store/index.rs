//! Schema index boundary
//!
//! Indexes are consumed read-only. Each one is described by the schema rule
//! that created it and exposes its (node, value) entries plus value lookups.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use super::record::{Record, Value};

/// Population state of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Fully populated and serving reads
    Online,
    /// Still being built
    Populating,
    /// Population failed; contents are not trusted
    Failed,
}

/// Index identity and schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Schema rule id of the index rule
    pub id: u64,
    /// Indexed label
    pub label: u32,
    /// Indexed property key
    pub property_key: u32,
    /// Unique index
    pub unique: bool,
    /// Population state
    pub state: IndexState,
}

/// One index entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Schema rule id of the index
    pub index: u64,
    /// Indexed node
    pub node: u64,
    /// Indexed value
    pub value: Value,
}

impl Record for IndexEntry {
    fn id(&self) -> u64 {
        self.node
    }

    fn in_use(&self) -> bool {
        true
    }

    fn unused(id: u64) -> Self {
        Self {
            index: 0,
            node: id,
            value: Value::Bool(false),
        }
    }
}

/// Read access to one index
pub trait IndexAccessor: Send + Sync {
    /// Every (node, value) entry
    fn entries(&self) -> Vec<(u64, Value)>;

    /// How many times a node is indexed under a value
    fn count(&self, node: u64, value: &Value) -> usize;

    /// Nodes indexed under a value
    fn nodes_with_value(&self, value: &Value) -> Vec<u64>;
}

/// Index backed by a value map; duplicate entries are kept so tests can
/// model a node indexed twice
#[derive(Debug, Default)]
pub struct MemoryIndex {
    by_value: RwLock<BTreeMap<Value, Vec<u64>>>,
}

impl MemoryIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn add(&self, node: u64, value: Value) {
        self.by_value.write().entry(value).or_default().push(node);
    }

    /// Remove one entry for (node, value)
    pub fn remove(&self, node: u64, value: &Value) {
        let mut by_value = self.by_value.write();
        if let Some(nodes) = by_value.get_mut(value) {
            if let Some(pos) = nodes.iter().position(|n| *n == node) {
                nodes.remove(pos);
            }
            if nodes.is_empty() {
                by_value.remove(value);
            }
        }
    }
}

impl IndexAccessor for MemoryIndex {
    fn entries(&self) -> Vec<(u64, Value)> {
        self.by_value
            .read()
            .iter()
            .flat_map(|(value, nodes)| nodes.iter().map(move |n| (*n, value.clone())))
            .collect()
    }

    fn count(&self, node: u64, value: &Value) -> usize {
        self.by_value
            .read()
            .get(value)
            .map_or(0, |nodes| nodes.iter().filter(|n| **n == node).count())
    }

    fn nodes_with_value(&self, value: &Value) -> Vec<u64> {
        let by_value = self.by_value.read();
        let distinct: BTreeSet<u64> = by_value
            .get(value)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default();
        distinct.into_iter().collect()
    }
}
