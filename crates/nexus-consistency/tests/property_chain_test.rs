//! Property chains that loop back on themselves

use std::sync::Arc;
use std::time::Duration;

use nexus_consistency::checking::{PropertyChainError, PropertyReader};
use nexus_consistency::report::{InconsistencyKind as K, MemorySink};
use nexus_consistency::store::{NULL_REFERENCE, PropertyBlock, PropertyRecord, PropertyType};
use nexus_consistency::testing::GraphStoreFixture;
use nexus_consistency::{CheckConfig, FullCheck, RecordType, Result};

/// Node 0 owns the chain 1 -> 2 -> 3 -> 4 -> 2
fn looping_chain() -> GraphStoreFixture {
    let mut fixture = GraphStoreFixture::new();
    let keys: Vec<u32> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| fixture.property_key(name))
        .collect();
    let node = fixture.node(&[], &[]);
    fixture.nodes.update(node, |n| n.next_prop = 1);

    let links = [(1, NULL_REFERENCE, 2), (2, 1, 3), (3, 2, 4), (4, 3, 2)];
    for (i, (id, prev, next)) in links.into_iter().enumerate() {
        fixture.properties.write(PropertyRecord {
            id,
            in_use: true,
            prev_prop: prev,
            next_prop: next,
            blocks: vec![PropertyBlock {
                key: keys[i],
                type_tag: PropertyType::Int as u8,
                value: i as u64,
            }],
        });
    }
    fixture
}

#[test]
fn test_reader_names_the_closing_record() {
    let fixture = looping_chain();
    let stores = fixture.store_access();
    match PropertyReader::new(&stores).property_record_chain(1) {
        Err(PropertyChainError::Circular { record }) => assert_eq!(record, 4),
        other => panic!("expected a circular chain, got {:?}", other.map(|c| c.len())),
    }
}

#[test]
fn test_full_check_terminates_and_reports_cycle() -> Result<()> {
    let fixture = looping_chain();
    let stores = Arc::new(fixture.store_access());
    let (done, finished) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let sink = Arc::new(MemorySink::new());
        let config = CheckConfig {
            sequential_threshold: 0,
            ..CheckConfig::with_threads(2)
        };
        let outcome = FullCheck::new(config).execute(stores, sink.clone());
        let _ = done.send(outcome.map(|_| sink.inconsistencies()));
    });

    let found = finished
        .recv_timeout(Duration::from_secs(30))
        .expect("full check did not terminate")?;
    assert!(
        found
            .iter()
            .any(|i| i.record_type == RecordType::Property
                && i.id == 4
                && i.kind == K::CircularPropertyChain),
        "{:?}",
        found
    );
    assert!(found.iter().any(|i| i.record_type == RecordType::Property
        && i.id == 4
        && i.kind == K::NextPropertyDoesNotReferenceBack { next: 2 }));
    Ok(())
}
