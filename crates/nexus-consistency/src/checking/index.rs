//! Schema indexes against the node store, in both directions
//!
//! [`IndexEntryChecker`] walks each index's entries and checks the node they
//! name. [`IndexNodeChecker`] walks the nodes and checks that every node
//! matching an index's label and property is indexed exactly once.

use std::sync::Arc;

use super::labels::NodeLabelReader;
use super::property_reader::PropertyReader;
use super::{CheckScope, RecordChecker};
use crate::error::Result;
use crate::report::{InconsistencyKind as K, RecordType};
use crate::store::{IndexAccessor, IndexDescriptor, IndexEntry, NodeRecord};

/// Checks the entries of one index
#[derive(Debug, Clone)]
pub struct IndexEntryChecker {
    descriptor: IndexDescriptor,
}

impl IndexEntryChecker {
    /// Checker for the index `descriptor`
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self { descriptor }
    }
}

impl RecordChecker for IndexEntryChecker {
    type Record = IndexEntry;

    fn record_type(&self) -> RecordType {
        RecordType::Index
    }

    fn check(&self, entry: &IndexEntry, scope: &CheckScope<'_>) -> Result<()> {
        let ctx = scope.ctx;
        let entity = entry.node;
        let node = ctx.stores.nodes.get(entity)?;
        if !node.in_use {
            ctx.report(RecordType::Index, self.descriptor.id, K::EntityNotInUse { entity });
            return Ok(());
        }
        let token = self.descriptor.label;
        if !NodeLabelReader::new(&ctx.stores).labels(&node)?.contains(&token) {
            ctx.report(
                RecordType::Index,
                self.descriptor.id,
                K::EntityDoesNotHaveExpectedToken { entity, token },
            );
        }
        Ok(())
    }
}

/// Checks every node against the online indexes covering its labels
pub struct IndexNodeChecker {
    indexes: Vec<(IndexDescriptor, Arc<dyn IndexAccessor>)>,
}

impl IndexNodeChecker {
    /// Checker over `indexes`
    pub fn new(indexes: Vec<(IndexDescriptor, Arc<dyn IndexAccessor>)>) -> Self {
        Self { indexes }
    }
}

impl RecordChecker for IndexNodeChecker {
    type Record = NodeRecord;

    fn record_type(&self) -> RecordType {
        RecordType::Node
    }

    fn check(&self, node: &NodeRecord, scope: &CheckScope<'_>) -> Result<()> {
        let ctx = scope.ctx;
        let labels = NodeLabelReader::new(&ctx.stores).labels(node)?;
        let properties = PropertyReader::new(&ctx.stores);
        for (descriptor, accessor) in &self.indexes {
            if !labels.contains(&descriptor.label) {
                continue;
            }
            let Some(value) = properties.chain_value(node.next_prop, descriptor.property_key)?
            else {
                continue;
            };
            let index = descriptor.id;
            match accessor.count(node.id, &value) {
                0 => {
                    ctx.report(
                        RecordType::Node,
                        node.id,
                        K::NotIndexed {
                            index,
                            value: value.clone(),
                        },
                    );
                }
                1 => {}
                count => ctx.report(
                    RecordType::Node,
                    node.id,
                    K::IndexedMultipleTimes { index, count },
                ),
            }
            if descriptor.unique {
                let duplicate = accessor
                    .nodes_with_value(&value)
                    .into_iter()
                    .filter(|other| *other != node.id)
                    .min();
                if let Some(duplicate_node) = duplicate {
                    ctx.report(
                        RecordType::Node,
                        node.id,
                        K::UniqueIndexNotUnique {
                            index,
                            duplicate_node,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::report::MemorySink;
    use crate::store::{IndexState, Value};
    use crate::testing::{GraphStoreFixture, check_records};

    fn run(fixture: &GraphStoreFixture) -> Arc<MemorySink> {
        let sink = Arc::new(MemorySink::new());
        let ctx = fixture.check_context_with_sink(sink.clone());
        let online: Vec<(IndexDescriptor, Arc<dyn IndexAccessor>)> = ctx
            .stores
            .indexes
            .iter()
            .filter(|(d, _)| d.state == IndexState::Online)
            .cloned()
            .collect();
        for (descriptor, accessor) in &online {
            let entries: Vec<IndexEntry> = accessor
                .entries()
                .into_iter()
                .map(|(node, value)| IndexEntry {
                    index: descriptor.id,
                    node,
                    value,
                })
                .collect();
            check_records(&IndexEntryChecker::new(descriptor.clone()), &ctx, entries).unwrap();
        }
        let nodes: Vec<NodeRecord> = ctx.stores.nodes.scan().map(|r| r.unwrap()).collect();
        check_records(&IndexNodeChecker::new(online), &ctx, nodes).unwrap();
        sink
    }

    #[test]
    fn test_index_both_directions() {
        let mut fixture = GraphStoreFixture::new();
        let person = fixture.label("Person");
        let name = fixture.property_key("name");
        let index = fixture.index(person, name, false);
        let ada = fixture.node(&[person], &[(name, Value::String("Ada".into()))]);
        let bob = fixture.node(&[person], &[(name, Value::String("Bob".into()))]);
        let plain = fixture.node(&[], &[]);
        assert!(run(&fixture).is_empty());

        let accessor = fixture.index_accessor(index);
        accessor.remove(ada, &Value::String("Ada".into()));
        accessor.add(bob, Value::String("Bob".into()));
        accessor.add(plain, Value::Int(1));
        let found = run(&fixture).inconsistencies();
        let has = |record_type, id, kind: K| {
            found
                .iter()
                .any(|i| i.record_type == record_type && i.id == id && i.kind == kind)
        };
        assert!(has(
            RecordType::Node,
            ada,
            K::NotIndexed {
                index,
                value: Value::String("Ada".into())
            }
        ));
        assert!(has(
            RecordType::Node,
            bob,
            K::IndexedMultipleTimes { index, count: 2 }
        ));
        assert!(has(
            RecordType::Index,
            index,
            K::EntityDoesNotHaveExpectedToken {
                entity: plain,
                token: person
            }
        ));
    }

    #[test]
    fn test_unique_index_duplicate_value() {
        let mut fixture = GraphStoreFixture::new();
        let person = fixture.label("Person");
        let email = fixture.property_key("email");
        let index = fixture.index(person, email, true);
        let first = fixture.node(&[person], &[(email, Value::String("a@x".into()))]);
        let second = fixture.node(&[person], &[(email, Value::String("b@x".into()))]);
        fixture.index_accessor(index).add(first, Value::String("b@x".into()));
        let found = run(&fixture).for_record_type(RecordType::Node);
        assert!(found.iter().any(|i| i.id == second
            && i.kind
                == K::UniqueIndexNotUnique {
                    index,
                    duplicate_node: first
                }));
    }
}
