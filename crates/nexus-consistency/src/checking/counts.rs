//! Counts store against the counts observed by the node and relationship stages

use std::collections::BTreeSet;

use super::CheckContext;
use crate::error::Result;
use crate::report::{InconsistencyKind as K, RecordType};
use crate::store::CountsKey;

/// Compare every stored count with the observed one
///
/// Keys are visited in order; the Nth key compared is reported as
/// `COUNTS[N]`. A key present on only one side counts as zero on the other.
pub fn check_counts(ctx: &CheckContext) -> Result<()> {
    let stored = ctx.stores.counts.entries();
    let observed: Vec<(CountsKey, u64)> = ctx
        .observed_counts
        .iter()
        .filter(|entry| *entry.value() > 0)
        .map(|entry| (*entry.key(), *entry.value()))
        .collect();

    let keys: BTreeSet<CountsKey> = stored
        .iter()
        .chain(observed.iter())
        .map(|(key, _)| *key)
        .collect();
    for (position, key) in keys.iter().enumerate() {
        let expected = ctx.observed_counts.get(key).map_or(0, |c| *c);
        let actual = ctx.stores.counts.get(key);
        if expected != actual {
            ctx.report(
                RecordType::Counts,
                position as u64,
                K::InconsistentCount {
                    key: *key,
                    expected,
                    actual,
                },
            );
        }
    }

    let node_keys =
        |entries: &[(CountsKey, u64)]| entries.iter().filter(|(k, _)| k.is_node()).count();
    let (expected_nodes, actual_nodes) = (node_keys(&observed), node_keys(&stored));
    if expected_nodes != actual_nodes {
        ctx.report(
            RecordType::Counts,
            0,
            K::InconsistentNumberOfNodeKeys {
                expected: expected_nodes,
                actual: actual_nodes,
            },
        );
    }
    let (expected_rels, actual_rels) = (
        observed.len() - expected_nodes,
        stored.len() - actual_nodes,
    );
    if expected_rels != actual_rels {
        ctx.report(
            RecordType::Counts,
            0,
            K::InconsistentNumberOfRelationshipKeys {
                expected: expected_rels,
                actual: actual_rels,
            },
        );
    }
    tracing::debug!(
        "counts: {} stored keys, {} observed keys",
        stored.len(),
        observed.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::report::MemorySink;

    #[test]
    fn test_matching_counts() {
        let fixture = crate::testing::GraphStoreFixture::new();
        fixture.counts.increment(CountsKey::node(None), 2);
        let sink = Arc::new(MemorySink::new());
        let ctx = fixture.check_context_with_sink(sink.clone());
        ctx.count(CountsKey::node(None));
        ctx.count(CountsKey::node(None));
        check_counts(&ctx).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_mismatch_and_missing_key() {
        let fixture = crate::testing::GraphStoreFixture::new();
        fixture.counts.increment(CountsKey::node(None), 3);
        fixture
            .counts
            .increment(CountsKey::relationship(None, Some(0), None), 1);
        let sink = Arc::new(MemorySink::new());
        let ctx = fixture.check_context_with_sink(sink.clone());
        ctx.count(CountsKey::node(None));
        ctx.count(CountsKey::node(Some(4)));
        check_counts(&ctx).unwrap();

        let found = sink.inconsistencies();
        let kinds: Vec<&K> = found.iter().map(|i| &i.kind).collect();
        assert!(kinds.contains(&&K::InconsistentCount {
            key: CountsKey::node(None),
            expected: 1,
            actual: 3
        }));
        assert!(kinds.contains(&&K::InconsistentCount {
            key: CountsKey::node(Some(4)),
            expected: 1,
            actual: 0
        }));
        assert!(kinds.contains(&&K::InconsistentNumberOfNodeKeys {
            expected: 2,
            actual: 1
        }));
        assert!(kinds.contains(&&K::InconsistentNumberOfRelationshipKeys {
            expected: 0,
            actual: 1
        }));
    }
}
