//! The gap-free scan store reader yields every range exactly once

use std::collections::BTreeMap;

use nexus_consistency::store::{
    ENTITIES_PER_RANGE, EntityTokenRange, GapFreeAllEntriesTokenScanReader,
};
use proptest::prelude::*;

fn range_with(id: u64, offset: usize, tokens: Vec<u32>) -> EntityTokenRange {
    let mut all = vec![Vec::new(); ENTITIES_PER_RANGE as usize];
    all[offset] = tokens;
    EntityTokenRange::new(id, all)
}

proptest! {
    #[test]
    fn prop_consecutive_ranges_with_tokens_preserved(
        stored in prop::collection::btree_map(
            0u64..200,
            (0usize..ENTITIES_PER_RANGE as usize, prop::collection::vec(0u32..20, 1..4)),
            0..30,
        ),
        high_entity_id in 0u64..20_000,
    ) {
        let source: Vec<EntityTokenRange> = stored
            .iter()
            .map(|(id, (offset, tokens))| range_with(*id, *offset, tokens.clone()))
            .collect();
        let expected: BTreeMap<u64, EntityTokenRange> =
            source.iter().map(|r| (r.id(), r.clone())).collect();

        let ranges: Vec<EntityTokenRange> =
            GapFreeAllEntriesTokenScanReader::new(source.into_iter(), high_entity_id).collect();

        let last_stored = stored.keys().next_back().copied();
        let last_from_high = high_entity_id.checked_sub(1).map(EntityTokenRange::range_of);
        let last = last_stored.max(last_from_high);
        prop_assert_eq!(ranges.len() as u64, last.map_or(0, |l| l + 1));
        for (i, range) in ranges.iter().enumerate() {
            prop_assert_eq!(range.id(), i as u64);
            match expected.get(&range.id()) {
                Some(original) => prop_assert_eq!(range, original),
                None => prop_assert!(range.is_empty()),
            }
        }

        let again: Vec<EntityTokenRange> =
            GapFreeAllEntriesTokenScanReader::new(ranges.clone().into_iter(), high_entity_id)
                .collect();
        prop_assert_eq!(again, ranges);
    }
}

#[test]
fn test_source_ranges_past_high_id_are_kept() {
    let source = vec![range_with(1, 0, vec![3]), range_with(6, 9, vec![1, 2])];
    // high id covers ranges 0..=2 only
    let ranges: Vec<EntityTokenRange> =
        GapFreeAllEntriesTokenScanReader::new(source.into_iter(), 2 * ENTITIES_PER_RANGE + 1)
            .collect();
    let ids: Vec<u64> = ranges.iter().map(|r| r.id()).collect();
    assert_eq!(ids, (0..=6).collect::<Vec<_>>());
    assert_eq!(ranges[6].tokens(6 * ENTITIES_PER_RANGE + 9), &[1, 2]);
    assert!(ranges[3..6].iter().all(|r| r.is_empty()));
}

#[test]
fn test_bounded_view_counts_high_id_ranges() {
    let reader = GapFreeAllEntriesTokenScanReader::new(std::iter::empty(), 3 * ENTITIES_PER_RANGE);
    let bounded = reader.into_bounded();
    assert_eq!(bounded.max_count(), 3);
    let ids: Vec<u64> = bounded.map(|r| r.unwrap().id()).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}
