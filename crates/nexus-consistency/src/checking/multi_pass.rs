//! Pass planning
//!
//! A store whose records point into several partitions is scanned once per
//! partition. During the pass for partition P only references into P are
//! resolved; references into any other partition come back as
//! [`RecordReference::Skip`](super::reference::RecordReference::Skip) and
//! are checked in their own pass. References into stores that are not a
//! partition, and checks local to the record, run in the first pass.
//!
//! ```text
//! relationships, partitions [NODES, RELATIONSHIPS, PROPERTIES]
//!
//!   pass 1  NODES          + local checks + non-partition references
//!   pass 2  RELATIONSHIPS
//!   pass 3  PROPERTIES
//! ```

use std::fmt;

/// Partition of the record stores that a pass may fully resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiPassStore {
    /// Node store
    Nodes,
    /// Relationship store
    Relationships,
    /// Property store
    Properties,
    /// Dynamic string store
    Strings,
    /// Dynamic array store
    Arrays,
}

impl MultiPassStore {
    /// Every partition, in pass order
    pub fn values() -> &'static [MultiPassStore] {
        &[
            Self::Nodes,
            Self::Relationships,
            Self::Properties,
            Self::Strings,
            Self::Arrays,
        ]
    }
}

impl fmt::Display for MultiPassStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nodes => write!(f, "NODES"),
            Self::Relationships => write!(f, "RELATIONSHIPS"),
            Self::Properties => write!(f, "PROPERTIES"),
            Self::Strings => write!(f, "STRINGS"),
            Self::Arrays => write!(f, "ARRAYS"),
        }
    }
}

/// What one pass is allowed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPlan {
    /// Partition resolved by the pass; `None` resolves everything
    pub partition: Option<MultiPassStore>,
    /// Local checks and non-partition references run in this pass
    pub first_pass: bool,
}

impl PassPlan {
    /// A pass that resolves every reference
    pub fn unfiltered() -> Self {
        Self {
            partition: None,
            first_pass: true,
        }
    }

    /// True if references into `partition` are resolved in this pass.
    /// `None` stands for a store that is not a partition.
    pub fn should_check(&self, partition: Option<MultiPassStore>) -> bool {
        match (self.partition, partition) {
            (None, _) => true,
            (Some(mine), Some(theirs)) => mine == theirs,
            (Some(_), None) => self.first_pass,
        }
    }

    /// Label for logs and progress
    pub fn label(&self) -> String {
        match self.partition {
            Some(p) => p.to_string(),
            None => "ALL".to_string(),
        }
    }
}

/// Passes for a store referencing `partitions`
pub fn plan_passes(partitions: &[MultiPassStore], multi_pass: bool) -> Vec<PassPlan> {
    if !multi_pass || partitions.len() <= 1 {
        return vec![PassPlan::unfiltered()];
    }
    MultiPassStore::values()
        .iter()
        .filter(|p| partitions.contains(p))
        .enumerate()
        .map(|(i, p)| PassPlan {
            partition: Some(*p),
            first_pass: i == 0,
        })
        .collect()
}
