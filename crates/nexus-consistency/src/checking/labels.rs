//! Node label reading

use std::collections::HashSet;

use crate::error::Result;
use crate::store::{NULL_REFERENCE, NodeLabels, NodeRecord, StoreAccess, decode_dynamic_labels};

/// What went wrong walking a dynamic label chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelChainProblem {
    /// This block is not in use
    NotInUse(u64),
    /// This block was already visited
    Cycle(u64),
    /// The payload could not be decoded
    Malformed,
}

/// Labels of one node together with how they were read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLabelRead {
    /// Label ids as stored
    pub labels: Vec<u32>,
    /// Owner embedded in the dynamic chain, if the labels are dynamic
    pub owner: Option<u64>,
    /// Blocks of the dynamic chain, in order
    pub blocks: Vec<u64>,
    /// First problem that ended the walk
    pub problem: Option<LabelChainProblem>,
    /// Bytes collected from the dynamic chain
    pub payload_len: usize,
}

/// Reads inline and dynamic node labels
pub struct NodeLabelReader<'a> {
    stores: &'a StoreAccess,
}

impl<'a> NodeLabelReader<'a> {
    /// Reader over `stores`
    pub fn new(stores: &'a StoreAccess) -> Self {
        Self { stores }
    }

    /// Labels of `node`, following its dynamic chain if it has one
    pub fn read(&self, node: &NodeRecord) -> Result<NodeLabelRead> {
        let first = match &node.labels {
            NodeLabels::Inline(labels) => {
                return Ok(NodeLabelRead {
                    labels: labels.clone(),
                    owner: None,
                    blocks: Vec::new(),
                    problem: None,
                    payload_len: 0,
                });
            }
            NodeLabels::Dynamic(first) => *first,
        };

        let mut payload = Vec::new();
        let mut blocks = Vec::new();
        let mut visited = HashSet::new();
        let mut problem = None;
        let mut next = first;
        while next != NULL_REFERENCE {
            if !visited.insert(next) {
                problem = Some(LabelChainProblem::Cycle(next));
                break;
            }
            let block = self.stores.node_labels.get(next)?;
            if !block.in_use {
                problem = Some(LabelChainProblem::NotInUse(next));
                break;
            }
            payload.extend_from_slice(&block.data);
            blocks.push(next);
            next = block.next;
        }

        let (owner, labels) = match decode_dynamic_labels(&payload) {
            Some((owner, labels)) => (Some(owner), labels),
            None => {
                problem.get_or_insert(LabelChainProblem::Malformed);
                (None, Vec::new())
            }
        };
        Ok(NodeLabelRead {
            labels,
            owner,
            blocks,
            problem,
            payload_len: payload.len(),
        })
    }

    /// Distinct labels of `node`, best effort
    pub fn labels(&self, node: &NodeRecord) -> Result<Vec<u32>> {
        let mut labels = self.read(node)?.labels;
        labels.sort_unstable();
        labels.dedup();
        Ok(labels)
    }
}
