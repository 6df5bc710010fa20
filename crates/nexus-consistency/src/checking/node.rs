//! Node records
//!
//! The first pass fills the node cache, checks labels and the dense node's
//! group pointer, and counts nodes per label. Property chains are checked in
//! the PROPERTIES pass.

use super::labels::{LabelChainProblem, NodeLabelReader};
use super::multi_pass::MultiPassStore;
use super::property::check_owner_properties;
use super::{CheckContext, CheckScope, RecordChecker};
use crate::error::Result;
use crate::report::{InconsistencyKind as K, RecordType};
use crate::store::{CountsKey, DynamicStoreKind, NULL_REFERENCE, NodeLabels, NodeRecord, TokenKind};

/// Checks node records
#[derive(Debug, Default)]
pub struct NodeChecker;

impl NodeChecker {
    /// New checker
    pub fn new() -> Self {
        Self
    }

    fn check_labels(&self, node: &NodeRecord, ctx: &CheckContext) -> Result<Vec<u32>> {
        let read = NodeLabelReader::new(&ctx.stores).read(node)?;

        if let NodeLabels::Dynamic(first) = node.labels {
            if ctx.flags.check_property_owners
                && ctx.dynamic_owners(DynamicStoreKind::NodeLabels).mark(first)
            {
                ctx.report(
                    RecordType::NodeDynamicLabel,
                    first,
                    K::NextBlockMultipleOwners { next: first },
                );
            }
            match read.problem {
                Some(LabelChainProblem::NotInUse(record)) => {
                    ctx.report(RecordType::Node, node.id, K::DynamicLabelRecordNotInUse { record });
                }
                Some(LabelChainProblem::Cycle(record)) => {
                    ctx.report(RecordType::Node, node.id, K::DynamicLabelChainCycle { record });
                }
                Some(LabelChainProblem::Malformed) => {
                    ctx.report(
                        RecordType::NodeDynamicLabel,
                        first,
                        K::InvalidLength {
                            length: read.payload_len,
                        },
                    );
                }
                None => {}
            }
            if let Some(owner) = read.owner.filter(|owner| *owner != node.id) {
                ctx.report(
                    RecordType::NodeDynamicLabel,
                    first,
                    K::DynamicLabelOwnerMismatch { owner },
                );
            }
        }

        for &label in &read.labels {
            if !ctx.tokens.in_use(TokenKind::Label, label) {
                ctx.report(RecordType::Node, node.id, K::LabelNotInUse { label });
            }
        }
        for pair in read.labels.windows(2) {
            if pair[0] == pair[1] {
                ctx.report(RecordType::Node, node.id, K::LabelDuplicate { label: pair[0] });
            } else if pair[0] > pair[1] {
                ctx.report(
                    RecordType::Node,
                    node.id,
                    K::LabelsOutOfOrder {
                        largest: pair[0],
                        smallest: pair[1],
                    },
                );
            }
        }

        let mut labels = read.labels;
        labels.sort_unstable();
        labels.dedup();
        Ok(labels)
    }

    fn check_group(&self, node: &NodeRecord, scope: &CheckScope<'_>) -> Result<()> {
        if !node.dense || node.next_rel == NULL_REFERENCE {
            return Ok(());
        }
        let id = node.id;
        let group = node.next_rel;
        scope
            .access
            .group(group)?
            .dispatch(scope.ctx, move |record, ctx| {
                if !record.in_use {
                    ctx.report(RecordType::Node, id, K::RelationshipGroupNotInUse { group });
                } else if record.owning_node != id {
                    ctx.report(
                        RecordType::Node,
                        id,
                        K::RelationshipGroupHasOtherOwner {
                            group,
                            owner: record.owning_node,
                        },
                    );
                }
            })
    }
}

impl RecordChecker for NodeChecker {
    type Record = NodeRecord;

    fn record_type(&self) -> RecordType {
        RecordType::Node
    }

    fn partitions(&self) -> &'static [MultiPassStore] {
        &[MultiPassStore::Properties]
    }

    fn check(&self, node: &NodeRecord, scope: &CheckScope<'_>) -> Result<()> {
        let ctx = scope.ctx;
        if scope.first_pass() {
            ctx.cache.put_node(node);
            let labels = self.check_labels(node, ctx)?;
            if ctx.flags.check_counts {
                ctx.count(CountsKey::node(None));
                for label in labels {
                    ctx.count(CountsKey::node(Some(label)));
                }
            }
            self.check_group(node, scope)?;
        }
        if scope.checks(MultiPassStore::Properties) {
            check_owner_properties(RecordType::Node, node.id, node.next_prop, scope)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::report::MemorySink;
    use crate::store::{
        DynamicRecord, PropertyRecord, Record, RecordStore, RelationshipGroupRecord, Value,
        encode_dynamic_labels,
    };
    use crate::testing::{GraphStoreFixture, check_records};

    fn kinds(sink: &MemorySink) -> Vec<(RecordType, u64, K)> {
        sink.inconsistencies()
            .into_iter()
            .map(|i| (i.record_type, i.id, i.kind))
            .collect()
    }

    fn run(fixture: &GraphStoreFixture) -> Arc<MemorySink> {
        let sink = Arc::new(MemorySink::new());
        let ctx = fixture.check_context_with_sink(sink.clone());
        let nodes: Vec<NodeRecord> = ctx.stores.nodes.scan().map(|r| r.unwrap()).collect();
        check_records(&NodeChecker::new(), &ctx, nodes).unwrap();
        sink
    }

    #[test]
    fn test_consistent_nodes() {
        let mut fixture = GraphStoreFixture::new();
        let person = fixture.label("Person");
        let name = fixture.property_key("name");
        fixture.node(&[person], &[(name, Value::String("Ada".into()))]);
        fixture.node(&[], &[]);
        assert!(run(&fixture).is_empty());
    }

    #[test]
    fn test_label_order_and_duplicates() {
        let mut fixture = GraphStoreFixture::new();
        let a = fixture.label("A");
        let b = fixture.label("B");
        fixture.nodes.write(NodeRecord {
            in_use: true,
            labels: NodeLabels::Inline(vec![b, a, a, 77]),
            ..NodeRecord::unused(0)
        });
        let found = kinds(&run(&fixture));
        assert!(found.contains(&(
            RecordType::Node,
            0,
            K::LabelsOutOfOrder {
                largest: b,
                smallest: a
            }
        )));
        assert!(found.contains(&(RecordType::Node, 0, K::LabelDuplicate { label: a })));
        assert!(found.contains(&(RecordType::Node, 0, K::LabelNotInUse { label: 77 })));
    }

    #[test]
    fn test_dynamic_label_owner_mismatch() {
        let mut fixture = GraphStoreFixture::new();
        let labels: Vec<u32> = (0..8).map(|i| fixture.label(&format!("L{}", i))).collect();
        let node = fixture.node(&labels, &[]);
        let first = match fixture.nodes.get(node).unwrap().labels {
            NodeLabels::Dynamic(first) => first,
            NodeLabels::Inline(_) => panic!("expected dynamic labels"),
        };
        fixture.node_labels.update(first, |block| {
            block.data = encode_dynamic_labels(node + 40, &labels);
        });
        let found = kinds(&run(&fixture));
        assert!(found.contains(&(
            RecordType::NodeDynamicLabel,
            first,
            K::DynamicLabelOwnerMismatch { owner: node + 40 }
        )));
    }

    #[test]
    fn test_dynamic_label_block_not_in_use() {
        let fixture = GraphStoreFixture::new();
        fixture.node_labels.write(DynamicRecord::unused(3));
        fixture.nodes.write(NodeRecord {
            in_use: true,
            labels: NodeLabels::Dynamic(3),
            ..NodeRecord::unused(0)
        });
        let found = kinds(&run(&fixture));
        assert!(found.contains(&(
            RecordType::Node,
            0,
            K::DynamicLabelRecordNotInUse { record: 3 }
        )));
    }

    #[test]
    fn test_dense_node_group_owned_by_other_node() {
        let mut fixture = GraphStoreFixture::new();
        let knows = fixture.relationship_type("KNOWS");
        let a = fixture.dense_node(&[]);
        let b = fixture.dense_node(&[]);
        fixture.relationship(a, b, knows);
        let group = fixture.nodes.get(a).unwrap().next_rel;
        fixture
            .relationship_groups
            .update(group, |g: &mut RelationshipGroupRecord| g.owning_node = b);
        let found = kinds(&run(&fixture));
        assert!(found.contains(&(
            RecordType::Node,
            a,
            K::RelationshipGroupHasOtherOwner { group, owner: b }
        )));
    }

    #[test]
    fn test_property_head_not_first_in_chain() {
        let mut fixture = GraphStoreFixture::new();
        let key = fixture.property_key("k");
        let node = fixture.node(&[], &[(key, Value::Int(1))]);
        let head = fixture.nodes.get(node).unwrap().next_prop;
        fixture
            .properties
            .update(head, |p: &mut PropertyRecord| p.prev_prop = 17);
        let found = kinds(&run(&fixture));
        assert!(found.contains(&(
            RecordType::Node,
            node,
            K::PropertyNotFirstInChain { property: head }
        )));
    }

    #[test]
    fn test_each_duplicated_key_reported_once() {
        let mut fixture = GraphStoreFixture::new();
        let keys: Vec<u32> = (0..6).map(|i| fixture.property_key(&format!("k{}", i))).collect();
        let properties: Vec<(u32, Value)> =
            keys.iter().map(|&k| (k, Value::Int(k as i64))).collect();
        let node = fixture.node(&[], &properties);
        let head = fixture.nodes.get(node).unwrap().next_prop;
        let second = fixture.properties.get(head).unwrap().next_prop;
        // k0 three times, k1 twice
        fixture
            .properties
            .update(head, |p: &mut PropertyRecord| p.blocks[3].key = keys[0]);
        fixture.properties.update(second, |p: &mut PropertyRecord| {
            p.blocks[0].key = keys[0];
            p.blocks[1].key = keys[1];
        });

        let mut duplicated: Vec<u32> = kinds(&run(&fixture))
            .into_iter()
            .filter_map(|(record_type, id, kind)| match kind {
                K::PropertyKeyNotUniqueInChain { key }
                    if record_type == RecordType::Node && id == node =>
                {
                    Some(key)
                }
                _ => None,
            })
            .collect();
        duplicated.sort_unstable();
        assert_eq!(duplicated, vec![keys[0], keys[1]]);
    }

    #[test]
    fn test_node_counts_observed() {
        let mut fixture = GraphStoreFixture::new();
        let a = fixture.label("A");
        fixture.node(&[a], &[]);
        fixture.node(&[a], &[]);
        fixture.node(&[], &[]);
        let sink = Arc::new(MemorySink::new());
        let ctx = fixture.check_context_with_sink(sink);
        let nodes: Vec<NodeRecord> = ctx.stores.nodes.scan().map(|r| r.unwrap()).collect();
        check_records(&NodeChecker::new(), &ctx, nodes).unwrap();
        assert_eq!(*ctx.observed_counts.get(&CountsKey::node(None)).unwrap(), 3);
        assert_eq!(*ctx.observed_counts.get(&CountsKey::node(Some(a))).unwrap(), 2);
        assert!(ctx.cache.in_use(0));
    }
}
