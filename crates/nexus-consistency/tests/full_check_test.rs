//! End-to-end full checks over fixture-built stores
//!
//! Each test builds a consistent store, injects one kind of corruption
//! through the raw store handles, and runs the whole stage sequence.

use std::sync::Arc;

use nexus_consistency::report::{Inconsistency, InconsistencyKind as K, MemorySink};
use nexus_consistency::store::{
    ChainSide, CountsKey, NodeLabels, RecordStore, RelationshipRecord, Value,
};
use nexus_consistency::testing::GraphStoreFixture;
use nexus_consistency::{
    CheckConfig, ConsistencySummaryStatistics, Distribution, FullCheck, RecordType, Result,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stage logs for `RUST_LOG=nexus_consistency=debug cargo test`
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nexus_consistency=warn".into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn config(threads: usize, distribution: Distribution) -> CheckConfig {
    CheckConfig {
        sequential_threshold: 0,
        records_per_queue: 3,
        relationship_distribution: distribution,
        ..CheckConfig::with_threads(threads)
    }
}

fn check_with(
    fixture: &GraphStoreFixture,
    config: CheckConfig,
) -> Result<(ConsistencySummaryStatistics, Vec<Inconsistency>)> {
    init_tracing();
    let sink = Arc::new(MemorySink::new());
    let summary =
        FullCheck::new(config).execute(Arc::new(fixture.store_access()), sink.clone())?;
    Ok((summary, sink.inconsistencies()))
}

fn check(fixture: &GraphStoreFixture) -> Result<Vec<Inconsistency>> {
    Ok(check_with(fixture, config(4, Distribution::Relationships))?.1)
}

fn has(found: &[Inconsistency], record_type: RecordType, id: u64, kind: &K) -> bool {
    found
        .iter()
        .any(|i| i.record_type == record_type && i.id == id && &i.kind == kind)
}

/// n0 has three relationships, n1 one plus a loop
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
fn test_random_graph_is_consistent_for_any_threading() -> Result<()> {
    let mut fixture = GraphStoreFixture::new();
    fixture.random_graph(7, 200, 800);
    for threads in [1, 2, 4] {
        for distribution in [Distribution::RoundRobin, Distribution::Relationships] {
            let (summary, found) = check_with(&fixture, config(threads, distribution))?;
            assert!(
                summary.is_consistent(),
                "threads={} {:?}: {:?}",
                threads,
                distribution,
                found
            );
        }
    }
    Ok(())
}

#[test]
fn test_single_pass_matches_multi_pass() -> Result<()> {
    let mut fixture = GraphStoreFixture::new();
    fixture.random_graph(11, 100, 300);
    let first_node = fixture.nodes.get(0)?;
    fixture
        .nodes
        .update(first_node.id, |n| n.next_prop = 9_999);

    let mut single = config(3, Distribution::Relationships);
    single.multi_pass = false;
    let (_, mut one) = check_with(&fixture, single)?;
    let (_, mut many) = check_with(&fixture, config(3, Distribution::Relationships))?;
    one.sort_by_key(|i| (i.record_type, i.id, i.kind.to_string()));
    many.sort_by_key(|i| (i.record_type, i.id, i.kind.to_string()));
    assert_eq!(one, many);
    assert!(has(
        &one,
        RecordType::Node,
        first_node.id,
        &K::PropertyNotInUse { property: 9_999 }
    ));
    Ok(())
}

#[test]
fn test_head_chain_length_off_by_one_reported_once() -> Result<()> {
    for threads in 2..=10 {
        for distribution in [Distribution::RoundRobin, Distribution::Relationships] {
            let (fixture, nodes, rels) = chain_fixture();
            // rels[2] heads n0's chain and stores its length
            fixture
                .relationships
                .update(rels[2], |r| r.first_prev_rel += 1);
            let (summary, found) = check_with(&fixture, config(threads, distribution))?;
            assert_eq!(found.len(), 1, "threads={}: {:?}", threads, found);
            assert_eq!(summary.total_inconsistency_count(), 1);
            assert!(has(
                &found,
                RecordType::Relationship,
                rels[2],
                &K::ChainLengthMismatch {
                    side: ChainSide::Source,
                    node: nodes[0],
                    expected: 4,
                    observed: 3,
                }
            ));
        }
    }
    Ok(())
}

#[test]
fn test_relationship_to_deleted_node() -> Result<()> {
    let (fixture, nodes, rels) = chain_fixture();
    fixture.nodes.update(nodes[3], |n| n.in_use = false);
    let found = check(&fixture)?;
    assert!(has(
        &found,
        RecordType::Relationship,
        rels[2],
        &K::NodeNotInUse {
            side: ChainSide::Target,
            node: nodes[3]
        }
    ));
    Ok(())
}

#[test]
fn test_prev_pointer_into_other_chain() -> Result<()> {
    let mut fixture = GraphStoreFixture::new();
    let knows = fixture.relationship_type("KNOWS");
    let nodes: Vec<u64> = (0..4).map(|_| fixture.node(&[], &[])).collect();
    let tail = fixture.relationship(nodes[0], nodes[1], knows);
    let head = fixture.relationship(nodes[0], nodes[1], knows);
    let unrelated = fixture.relationship(nodes[2], nodes[3], knows);
    fixture
        .relationships
        .update(tail, |r| r.first_prev_rel = unrelated);

    let found = check(&fixture)?;
    assert!(has(
        &found,
        RecordType::Relationship,
        tail,
        &K::PrevReferencesOtherNodes {
            side: ChainSide::Source,
            prev: unrelated
        }
    ));
    assert!(has(
        &found,
        RecordType::Relationship,
        head,
        &K::NextDoesNotReferenceBack {
            side: ChainSide::Source,
            next: tail
        }
    ));
    Ok(())
}

#[test]
fn test_node_label_and_scan_store_damage() -> Result<()> {
    let mut fixture = GraphStoreFixture::new();
    let person = fixture.label("Person");
    let ada = fixture.node(&[person], &[]);
    let bob = fixture.node(&[person], &[]);
    fixture
        .nodes
        .update(ada, |n| n.labels = NodeLabels::Inline(vec![person, 77]));
    fixture.label_scan.remove(bob, person);

    let found = check(&fixture)?;
    assert!(has(&found, RecordType::Node, ada, &K::LabelNotInUse { label: 77 }));
    assert!(has(
        &found,
        RecordType::Node,
        bob,
        &K::TokenNotInScanStore { token: person }
    ));
    Ok(())
}

#[test]
fn test_string_value_block_not_in_use() -> Result<()> {
    let mut fixture = GraphStoreFixture::new();
    let bio = fixture.property_key("bio");
    let long = "a biography that does not fit inline ".repeat(4);
    let node = fixture.node(&[], &[(bio, Value::String(long))]);
    let first_prop = fixture.nodes.get(node)?.next_prop;
    fixture.strings.update(0, |b| b.in_use = false);

    let found = check(&fixture)?;
    assert!(found.iter().any(|i| i.record_type == RecordType::Property
        && i.id == first_prop
        && matches!(i.kind, K::DynamicValueNotInUse { record: 0, .. })));
    Ok(())
}

#[test]
fn test_counts_mismatch() -> Result<()> {
    let (fixture, _, _) = chain_fixture();
    fixture.counts.set(CountsKey::node(None), 99);
    let found = check(&fixture)?;
    assert!(found.iter().any(|i| i.record_type == RecordType::Counts
        && i.kind
            == K::InconsistentCount {
                key: CountsKey::node(None),
                expected: 4,
                actual: 99
            }));
    Ok(())
}

#[test]
fn test_dense_node_group_owned_by_other_node() -> Result<()> {
    let mut fixture = GraphStoreFixture::new();
    let knows = fixture.relationship_type("KNOWS");
    let hub = fixture.dense_node(&[]);
    let other = fixture.node(&[], &[]);
    fixture.relationship(hub, other, knows);
    let group = fixture.nodes.get(hub)?.next_rel;
    fixture
        .relationship_groups
        .update(group, |g| g.owning_node = other);

    let found = check(&fixture)?;
    assert!(found.iter().any(|i| i.record_type == RecordType::Node && i.id == hub));
    Ok(())
}

#[test]
fn test_large_random_graph() -> Result<()> {
    let mut fixture = GraphStoreFixture::new();
    fixture.random_graph(42, 1_000, 10_000);
    let (summary, found) = check_with(&fixture, CheckConfig::with_threads(4))?;
    assert!(summary.is_consistent(), "{:?}", &found[..found.len().min(10)]);

    let victim: RelationshipRecord = fixture.relationships.get(5_000)?;
    fixture
        .relationships
        .update(victim.id, |r| r.rel_type = 1_000);
    let (summary, _) = check_with(&fixture, CheckConfig::with_threads(4))?;
    assert!(
        summary.inconsistency_count_for_record_type(RecordType::Relationship) >= 1,
        "{}",
        summary
    );
    Ok(())
}

#[test]
fn test_chain_pointer_damage_found_anywhere_in_store() -> Result<()> {
    let mut fixture = GraphStoreFixture::new();
    fixture.random_graph(42, 1_000, 10_000);
    for victim in [0, 1, 777, 5_000, 9_998, 9_999] {
        let original = fixture.relationships.get(victim)?.first_prev_rel;
        fixture
            .relationships
            .update(victim, |r| r.first_prev_rel = original.wrapping_add(1));
        for threads in [2, 3, 5, 10] {
            for distribution in [Distribution::RoundRobin, Distribution::Relationships] {
                let config = CheckConfig {
                    relationship_distribution: distribution,
                    ..CheckConfig::with_threads(threads)
                };
                let (summary, _) = check_with(&fixture, config)?;
                assert!(
                    summary.inconsistency_count_for_record_type(RecordType::Relationship) >= 1,
                    "relationship {} threads={} {:?}",
                    victim,
                    threads,
                    distribution
                );
            }
        }
        fixture
            .relationships
            .update(victim, |r| r.first_prev_rel = original);
    }
    Ok(())
}

#[test]
fn test_scan_store_entries_past_high_id() -> Result<()> {
    let mut fixture = GraphStoreFixture::new();
    let person = fixture.label("Person");
    fixture.node(&[person], &[]);
    fixture.node(&[person], &[]);
    fixture.label_scan.add(5, person);
    fixture.label_scan.add(500, person);

    let (summary, found) = check_with(&fixture, config(2, Distribution::Relationships))?;
    for entity in [5, 500] {
        assert!(
            found.iter().any(|i| i.record_type == RecordType::LabelScanDocument
                && i.kind == K::EntityNotInUse { entity }),
            "{:?}",
            found
        );
    }
    assert_eq!(
        summary.inconsistency_count_for_record_type(RecordType::LabelScanDocument),
        2
    );
    Ok(())
}
