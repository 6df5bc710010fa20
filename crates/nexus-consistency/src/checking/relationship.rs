//! Relationship records and the node relationship cache sweep
//!
//! ```text
//! pass        per owned side                        primary queue only
//! ─────────── ───────────────────────────────────── ──────────────────────
//! first       -                                      type, IllegalNode
//! NODES       node in use, degree, back-reference,   (*,*,*) (*,t,*) counts
//!             side label counts
//! RELS        prev/next pointers (deferred)          arrive
//! PROPERTIES  -                                      property chain
//! ```
//!
//! Under the relationship distribution a record reaches the queue of each
//! endpoint. Side work is done by the queue owning that side's node; record
//! work by the queue owning the first node, so nothing runs twice. Chain
//! lengths are compared once every relationship has been seen, in
//! [`check_node_relationship_cache`].

use std::sync::Arc;

use rayon::prelude::*;

use super::labels::NodeLabelReader;
use super::multi_pass::MultiPassStore;
use super::property::check_owner_properties;
use super::reference::{DeferredReferences, DeferredStats, RecordReference};
use super::{CheckContext, CheckScope, RecordAccess, RecordChecker};
use crate::error::Result;
use crate::report::{InconsistencyKind as K, RecordType};
use crate::store::{ChainSide, CountsKey, NO_TOKEN, NULL_REFERENCE, RelationshipRecord, TokenKind};

/// Checks relationship records
pub struct RelationshipChecker {
    chains: Arc<DeferredReferences<RelationshipRecord>>,
}

impl RelationshipChecker {
    /// Checker resolving chain neighbours through `ctx`'s relationship store
    pub fn new(ctx: &CheckContext) -> Self {
        Self {
            chains: Arc::new(DeferredReferences::new(
                "relationship chain",
                ctx.stores.relationships.clone(),
                Some(MultiPassStore::Relationships),
            )),
        }
    }

    fn check_local(&self, rel: &RelationshipRecord, ctx: &CheckContext) {
        if rel.rel_type == NO_TOKEN {
            ctx.report(RecordType::Relationship, rel.id, K::IllegalRelationshipType);
        } else if !ctx.tokens.in_use(TokenKind::RelationshipType, rel.rel_type) {
            ctx.report(
                RecordType::Relationship,
                rel.id,
                K::RelationshipTypeNotInUse {
                    rel_type: rel.rel_type,
                },
            );
        }
        for side in [ChainSide::Source, ChainSide::Target] {
            if rel.node(side) == NULL_REFERENCE {
                ctx.report(RecordType::Relationship, rel.id, K::IllegalNode { side });
            }
        }
    }

    fn check_nodes(&self, rel: &RelationshipRecord, scope: &CheckScope<'_>) {
        let ctx = scope.ctx;
        for &side in rel.sides() {
            let node = rel.node(side);
            if node == NULL_REFERENCE || !scope.queue.owns_node(node) {
                continue;
            }
            if !ctx.cache.in_use(node) {
                ctx.report(RecordType::Relationship, rel.id, K::NodeNotInUse { side, node });
                continue;
            }
            ctx.cache.increment_degree(node);
            if !rel.first_in_chain(side) {
                continue;
            }
            ctx.cache.add_expected_degree(node, rel.prev(side));
            if ctx.cache.is_dense(node) {
                continue;
            }
            if ctx.cache.first_rel(node) == rel.id {
                ctx.cache.confirm_first_rel(node);
            } else {
                ctx.report(
                    RecordType::Relationship,
                    rel.id,
                    K::NodeDoesNotReferenceBack { side, node },
                );
            }
        }
    }

    fn node_labels(&self, node: u64, scope: &CheckScope<'_>) -> Result<Vec<u32>> {
        if node == NULL_REFERENCE {
            return Ok(Vec::new());
        }
        match scope.access.node(node)? {
            RecordReference::Resolved(record) if record.in_use => {
                NodeLabelReader::new(&scope.ctx.stores).labels(&record)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn count(&self, rel: &RelationshipRecord, scope: &CheckScope<'_>) -> Result<()> {
        let ctx = scope.ctx;
        let rel_type = (rel.rel_type != NO_TOKEN).then_some(rel.rel_type);
        if scope.queue.owns_node(rel.first_node) {
            ctx.count(CountsKey::relationship(None, None, None));
            if rel_type.is_some() {
                ctx.count(CountsKey::relationship(None, rel_type, None));
            }
            for label in self.node_labels(rel.first_node, scope)? {
                ctx.count(CountsKey::relationship(Some(label), None, None));
                if rel_type.is_some() {
                    ctx.count(CountsKey::relationship(Some(label), rel_type, None));
                }
            }
        }
        if scope.queue.owns_node(rel.second_node) {
            for label in self.node_labels(rel.second_node, scope)? {
                ctx.count(CountsKey::relationship(None, None, Some(label)));
                if rel_type.is_some() {
                    ctx.count(CountsKey::relationship(None, rel_type, Some(label)));
                }
            }
        }
        Ok(())
    }

    fn check_chains(&self, rel: &RelationshipRecord, scope: &CheckScope<'_>) -> Result<()> {
        let id = rel.id;
        for &side in rel.sides() {
            let node = rel.node(side);
            if node == NULL_REFERENCE || !scope.queue.owns_node(node) {
                continue;
            }
            if !rel.first_in_chain(side) {
                let prev = rel.prev(side);
                if prev == NULL_REFERENCE {
                    scope.ctx.report(
                        RecordType::Relationship,
                        id,
                        K::PrevNotInUse { side, prev },
                    );
                } else {
                    self.chains
                        .reference(scope.access, prev)
                        .dispatch(scope.ctx, move |target, ctx| {
                            check_prev(id, side, node, prev, target, ctx)
                        })?;
                }
            }
            let next = rel.next(side);
            if next != NULL_REFERENCE {
                self.chains
                    .reference(scope.access, next)
                    .dispatch(scope.ctx, move |target, ctx| {
                        check_next(id, side, node, next, target, ctx)
                    })?;
            }
        }
        Ok(())
    }
}

fn check_prev(
    id: u64,
    side: ChainSide,
    node: u64,
    prev: u64,
    target: &RelationshipRecord,
    ctx: &CheckContext,
) {
    if !target.in_use {
        ctx.report(RecordType::Relationship, id, K::PrevNotInUse { side, prev });
        return;
    }
    match target.side_of(node) {
        None => ctx.report(
            RecordType::Relationship,
            id,
            K::PrevReferencesOtherNodes { side, prev },
        ),
        Some(target_side) if target.next(target_side) != id => ctx.report(
            RecordType::Relationship,
            id,
            K::PrevDoesNotReferenceBack { side, prev },
        ),
        Some(_) => {}
    }
}

fn check_next(
    id: u64,
    side: ChainSide,
    node: u64,
    next: u64,
    target: &RelationshipRecord,
    ctx: &CheckContext,
) {
    if !target.in_use {
        ctx.report(RecordType::Relationship, id, K::NextNotInUse { side, next });
        return;
    }
    match target.side_of(node) {
        None => ctx.report(
            RecordType::Relationship,
            id,
            K::NextReferencesOtherNodes { side, next },
        ),
        Some(target_side)
            if target.first_in_chain(target_side) || target.prev(target_side) != id =>
        {
            ctx.report(
                RecordType::Relationship,
                id,
                K::NextDoesNotReferenceBack { side, next },
            )
        }
        Some(_) => {}
    }
}

impl RecordChecker for RelationshipChecker {
    type Record = RelationshipRecord;

    fn record_type(&self) -> RecordType {
        RecordType::Relationship
    }

    fn partitions(&self) -> &'static [MultiPassStore] {
        &[
            MultiPassStore::Nodes,
            MultiPassStore::Relationships,
            MultiPassStore::Properties,
        ]
    }

    fn pass_started(&self, access: &dyn RecordAccess) {
        self.chains.begin_pass(access);
    }

    fn check(&self, rel: &RelationshipRecord, scope: &CheckScope<'_>) -> Result<()> {
        let ctx = scope.ctx;
        let primary = scope.queue.owns_node(rel.first_node);
        if primary && scope.first_pass() {
            self.check_local(rel, ctx);
        }
        if scope.checks(MultiPassStore::Nodes) {
            self.check_nodes(rel, scope);
            if ctx.flags.check_counts {
                self.count(rel, scope)?;
            }
        }
        if scope.checks(MultiPassStore::Relationships) {
            self.check_chains(rel, scope)?;
            if primary {
                self.chains.arrive(rel, ctx);
            }
        }
        if primary && scope.checks(MultiPassStore::Properties) {
            check_owner_properties(RecordType::Relationship, rel.id, rel.next_prop, scope)?;
        }
        Ok(())
    }

    fn check_deferred(&self, ctx: &CheckContext) -> Result<()> {
        self.chains.finish(ctx)
    }

    fn deferred_stats(&self) -> DeferredStats {
        self.chains.take_stats()
    }
}

/// Sweep the node cache once every relationship has been seen
///
/// A node whose first relationship was never confirmed by a chain head is
/// checked against the relationship store directly. Chain lengths stored in
/// the heads are compared with the relationships counted per node; the
/// mismatch is filed on the head when the node's first relationship is
/// known, on the node otherwise.
pub fn check_node_relationship_cache(ctx: &CheckContext) -> Result<()> {
    if ctx.stop.is_stopped() {
        return Ok(());
    }
    let relationships = &ctx.stores.relationships;
    (0..ctx.cache.len()).into_par_iter().try_for_each(|node| {
        let Some(entry) = ctx.cache.entry(node) else {
            return Ok(());
        };
        if !entry.in_use {
            return Ok(());
        }
        let first = entry.first_rel;
        if !entry.dense && first != NULL_REFERENCE && !entry.first_rel_confirmed {
            let rel = relationships.get(first)?;
            if !rel.in_use {
                ctx.report(
                    RecordType::Node,
                    node,
                    K::RelationshipNotInUse { relationship: first },
                );
            } else {
                match rel.side_of(node) {
                    None => ctx.report(
                        RecordType::Node,
                        node,
                        K::RelationshipForOtherNode { relationship: first },
                    ),
                    Some(side) if !rel.first_in_chain(side) => ctx.report(
                        RecordType::Node,
                        node,
                        K::RelationshipNotFirstInChain {
                            relationship: first,
                            side,
                        },
                    ),
                    Some(_) => {}
                }
            }
        }

        if entry.expected_degree == entry.observed_degree {
            return Ok(());
        }
        if !entry.dense && entry.first_rel_confirmed {
            let rel = relationships.get(first)?;
            let side = rel.side_of(node).unwrap_or(ChainSide::Source);
            ctx.report(
                RecordType::Relationship,
                first,
                K::ChainLengthMismatch {
                    side,
                    node,
                    expected: entry.expected_degree,
                    observed: entry.observed_degree,
                },
            );
        } else {
            ctx.report(
                RecordType::Node,
                node,
                K::RelationshipChainLengthMismatch {
                    expected: entry.expected_degree,
                    observed: entry.observed_degree,
                },
            );
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::checking::node::NodeChecker;
    use crate::report::MemorySink;
    use crate::store::{NodeRecord, RecordStore};
    use crate::testing::{GraphStoreFixture, check_records};

    fn run(fixture: &GraphStoreFixture) -> (Arc<MemorySink>, Arc<CheckContext>) {
        let sink = Arc::new(MemorySink::new());
        let ctx = fixture.check_context_with_sink(sink.clone());
        let nodes: Vec<NodeRecord> = ctx.stores.nodes.scan().map(|r| r.unwrap()).collect();
        check_records(&NodeChecker::new(), &ctx, nodes).unwrap();
        let rels: Vec<RelationshipRecord> = ctx
            .stores
            .relationships
            .scan()
            .map(|r| r.unwrap())
            .collect();
        check_records(&RelationshipChecker::new(&ctx), &ctx, rels).unwrap();
        check_node_relationship_cache(&ctx).unwrap();
        (sink, ctx)
    }

    fn chain_fixture() -> (GraphStoreFixture, Vec<u64>, Vec<u64>) {
        let mut fixture = GraphStoreFixture::new();
        let knows = fixture.relationship_type("KNOWS");
        let nodes: Vec<u64> = (0..4).map(|_| fixture.node(&[], &[])).collect();
        let rels = vec![
            fixture.relationship(nodes[0], nodes[1], knows),
            fixture.relationship(nodes[0], nodes[2], knows),
            fixture.relationship(nodes[0], nodes[3], knows),
            fixture.relationship(nodes[1], nodes[1], knows),
        ];
        (fixture, nodes, rels)
    }

    #[test]
    fn test_consistent_chains() {
        let (fixture, _, _) = chain_fixture();
        let (sink, _) = run(&fixture);
        assert!(sink.is_empty(), "{:?}", sink.inconsistencies());
    }

    #[test]
    fn test_broken_prev_pointer() {
        let (fixture, _, rels) = chain_fixture();
        // Insertion is at the head, so rels[0] is the tail of node 0's chain.
        let tail = rels[0];
        let prev = fixture.relationships.get(tail).unwrap().first_prev_rel;
        assert_eq!(prev, rels[1]);
        fixture
            .relationships
            .update(tail, |r| r.first_prev_rel = rels[3]);
        let (sink, _) = run(&fixture);
        let found = sink.for_record_type(RecordType::Relationship);
        assert!(found.iter().any(|i| i.id == tail
            && i.kind
                == K::PrevReferencesOtherNodes {
                    side: ChainSide::Source,
                    prev: rels[3]
                }));
    }

    #[test]
    fn test_chain_length_mismatch_on_head() {
        let (fixture, nodes, rels) = chain_fixture();
        let head = rels[2];
        fixture
            .relationships
            .update(head, |r| r.first_prev_rel += 1);
        let (sink, _) = run(&fixture);
        let found = sink.inconsistencies();
        assert_eq!(found.len(), 1, "{:?}", found);
        assert_eq!(found[0].record_type, RecordType::Relationship);
        assert_eq!(
            found[0].kind,
            K::ChainLengthMismatch {
                side: ChainSide::Source,
                node: nodes[0],
                expected: 4,
                observed: 3
            }
        );
    }

    #[test]
    fn test_node_first_relationship_not_head() {
        let (fixture, nodes, rels) = chain_fixture();
        fixture.nodes.update(nodes[0], |n| n.next_rel = rels[0]);
        let (sink, _) = run(&fixture);
        let found = sink.inconsistencies();
        assert!(found.iter().any(|i| i.record_type == RecordType::Node
            && i.kind
                == K::RelationshipNotFirstInChain {
                    relationship: rels[0],
                    side: ChainSide::Source
                }));
        assert!(found.iter().any(|i| i.id == rels[2]
            && i.kind
                == K::NodeDoesNotReferenceBack {
                    side: ChainSide::Source,
                    node: nodes[0]
                }));
    }

    #[test]
    fn test_unknown_type_and_deleted_endpoint() {
        let (fixture, nodes, rels) = chain_fixture();
        fixture.relationships.update(rels[1], |r| r.rel_type = 42);
        fixture.nodes.update(nodes[3], |n| n.in_use = false);
        let (sink, _) = run(&fixture);
        let found = sink.for_record_type(RecordType::Relationship);
        assert!(found
            .iter()
            .any(|i| i.id == rels[1] && i.kind == K::RelationshipTypeNotInUse { rel_type: 42 }));
        assert!(found.iter().any(|i| i.id == rels[2]
            && i.kind
                == K::NodeNotInUse {
                    side: ChainSide::Target,
                    node: nodes[3]
                }));
    }

    #[test]
    fn test_relationship_counts() {
        let mut fixture = GraphStoreFixture::new();
        let person = fixture.label("Person");
        let knows = fixture.relationship_type("KNOWS");
        let a = fixture.node(&[person], &[]);
        let b = fixture.node(&[], &[]);
        fixture.relationship(a, b, knows);
        fixture.relationship(b, a, knows);
        let (_, ctx) = run(&fixture);
        let count = |key| ctx.observed_counts.get(&key).map_or(0, |c| *c);
        assert_eq!(count(CountsKey::relationship(None, None, None)), 2);
        assert_eq!(count(CountsKey::relationship(None, Some(knows), None)), 2);
        assert_eq!(count(CountsKey::relationship(Some(person), Some(knows), None)), 1);
        assert_eq!(count(CountsKey::relationship(None, Some(knows), Some(person))), 1);
    }
}
