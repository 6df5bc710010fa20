//! Label and relationship type scan stores
//!
//! A scan store maps entity ids to the token ids they carry, grouped into
//! fixed ranges of [`ENTITIES_PER_RANGE`] entities. Readers may skip ranges
//! that hold no entries; [`GapFreeAllEntriesTokenScanReader`] puts them back.

use std::collections::BTreeMap;
use std::iter::Peekable;

use parking_lot::RwLock;

use super::record::Record;
use super::BoundedIterable;

/// Entities covered by one range
pub const ENTITIES_PER_RANGE: u64 = 64;

/// Token ids of every entity in one range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTokenRange {
    id: u64,
    tokens: Vec<Vec<u32>>,
}

impl EntityTokenRange {
    /// Range holding the given per-entity token lists, padded to full width
    pub fn new(id: u64, mut tokens: Vec<Vec<u32>>) -> Self {
        tokens.resize(ENTITIES_PER_RANGE as usize, Vec::new());
        tokens.truncate(ENTITIES_PER_RANGE as usize);
        Self { id, tokens }
    }

    /// Range without any entries
    pub fn empty(id: u64) -> Self {
        Self::new(id, Vec::new())
    }

    /// Range id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Range containing an entity
    pub fn range_of(entity: u64) -> u64 {
        entity / ENTITIES_PER_RANGE
    }

    /// First entity id covered
    pub fn first_entity(&self) -> u64 {
        self.id * ENTITIES_PER_RANGE
    }

    /// Entity ids covered by this range
    pub fn entities(&self) -> std::ops::Range<u64> {
        self.first_entity()..self.first_entity() + ENTITIES_PER_RANGE
    }

    /// True when `entity` falls inside this range
    pub fn covers(&self, entity: u64) -> bool {
        Self::range_of(entity) == self.id
    }

    /// Tokens of one entity; empty for entities outside the range
    pub fn tokens(&self, entity: u64) -> &[u32] {
        if !self.covers(entity) {
            return &[];
        }
        &self.tokens[(entity - self.first_entity()) as usize]
    }

    /// No entity in the range carries a token
    pub fn is_empty(&self) -> bool {
        self.tokens.iter().all(Vec::is_empty)
    }

    fn tokens_mut(&mut self, entity: u64) -> &mut Vec<u32> {
        let offset = (entity - self.first_entity()) as usize;
        &mut self.tokens[offset]
    }
}

impl Record for EntityTokenRange {
    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        true
    }

    fn unused(id: u64) -> Self {
        Self::empty(id)
    }
}

/// Read access to a token scan store
pub trait TokenScanReader: Send + Sync {
    /// Ranges in increasing id order; ranges without entries may be left out
    fn all_entries(&self) -> Box<dyn Iterator<Item = EntityTokenRange> + '_>;
}

/// Scan store backed by a map of non-empty ranges
#[derive(Debug, Default)]
pub struct MemoryTokenScanStore {
    ranges: RwLock<BTreeMap<u64, EntityTokenRange>>,
}

impl MemoryTokenScanStore {
    /// Create an empty scan store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token to an entity
    pub fn add(&self, entity: u64, token: u32) {
        let mut ranges = self.ranges.write();
        let range_id = EntityTokenRange::range_of(entity);
        let range = ranges
            .entry(range_id)
            .or_insert_with(|| EntityTokenRange::empty(range_id));
        let tokens = range.tokens_mut(entity);
        if let Err(pos) = tokens.binary_search(&token) {
            tokens.insert(pos, token);
        }
    }

    /// Remove a token from an entity
    pub fn remove(&self, entity: u64, token: u32) {
        let mut ranges = self.ranges.write();
        let range_id = EntityTokenRange::range_of(entity);
        let emptied = match ranges.get_mut(&range_id) {
            Some(range) => {
                range.tokens_mut(entity).retain(|t| *t != token);
                range.is_empty()
            }
            None => false,
        };
        if emptied {
            ranges.remove(&range_id);
        }
    }
}

impl TokenScanReader for MemoryTokenScanStore {
    fn all_entries(&self) -> Box<dyn Iterator<Item = EntityTokenRange> + '_> {
        let snapshot: Vec<EntityTokenRange> = self.ranges.read().values().cloned().collect();
        Box::new(snapshot.into_iter())
    }
}

/// Reader that yields one range for every id from 0 up to the last range,
/// synthesizing empty ranges for ids the wrapped reader leaves out.
///
/// The last range is the larger of the wrapped reader's last range and the
/// range holding `high_entity_id - 1`, so every entity below the high id is
/// covered even when the scan store has no entries for it.
pub struct GapFreeAllEntriesTokenScanReader<I: Iterator<Item = EntityTokenRange>> {
    source: Peekable<I>,
    next_id: u64,
    last_range_from_high_id: Option<u64>,
}

impl<I: Iterator<Item = EntityTokenRange>> GapFreeAllEntriesTokenScanReader<I> {
    /// Wrap a range iterator sorted by range id
    pub fn new(source: I, high_entity_id: u64) -> Self {
        Self {
            source: source.peekable(),
            next_id: 0,
            last_range_from_high_id: high_entity_id
                .checked_sub(1)
                .map(EntityTokenRange::range_of),
        }
    }

    /// Bounded view for the record scanners
    pub fn into_bounded<'a>(self) -> BoundedIterable<'a, EntityTokenRange>
    where
        I: 'a,
    {
        let max_count = self.last_range_from_high_id.map_or(0, |last| last + 1);
        BoundedIterable::new(self.map(Ok), max_count)
    }
}

impl<I: Iterator<Item = EntityTokenRange>> Iterator for GapFreeAllEntriesTokenScanReader<I> {
    type Item = EntityTokenRange;

    fn next(&mut self) -> Option<Self::Item> {
        let candidate = self.next_id;
        // Out-of-order or repeated source ranges were already covered.
        while self.source.peek().is_some_and(|r| r.id() < candidate) {
            self.source.next();
        }
        let range = match self.source.peek() {
            Some(r) if r.id() == candidate => self.source.next()?,
            Some(_) => EntityTokenRange::empty(candidate),
            None => match self.last_range_from_high_id {
                Some(last) if candidate <= last => EntityTokenRange::empty(candidate),
                _ => return None,
            },
        };
        self.next_id += 1;
        Some(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_with(id: u64, entity_offset: usize, tokens: Vec<u32>) -> EntityTokenRange {
        let mut all = vec![Vec::new(); ENTITIES_PER_RANGE as usize];
        all[entity_offset] = tokens;
        EntityTokenRange::new(id, all)
    }

    #[test]
    fn test_range_covers_and_tokens() {
        let range = range_with(2, 3, vec![4, 9]);
        assert!(range.covers(128 + 3));
        assert!(!range.covers(3));
        assert_eq!(range.tokens(131), &[4, 9]);
        assert!(range.tokens(130).is_empty());
        assert!(range.tokens(5).is_empty());
    }

    #[test]
    fn test_memory_store_keeps_sorted_tokens_and_drops_empty_ranges() {
        let store = MemoryTokenScanStore::new();
        store.add(70, 5);
        store.add(70, 2);
        store.add(70, 5);
        let ranges: Vec<_> = store.all_entries().collect();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].id(), 1);
        assert_eq!(ranges[0].tokens(70), &[2, 5]);

        store.remove(70, 2);
        store.remove(70, 5);
        assert_eq!(store.all_entries().count(), 0);
    }

    #[test]
    fn test_gap_free_reader_fills_holes() {
        let source = vec![range_with(1, 0, vec![1]), range_with(4, 2, vec![3])];
        let ranges: Vec<_> = GapFreeAllEntriesTokenScanReader::new(source.into_iter(), 0).collect();
        let ids: Vec<u64> = ranges.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(ranges[0].is_empty());
        assert_eq!(ranges[1].tokens(64), &[1]);
        assert_eq!(ranges[4].tokens(258), &[3]);
    }

    #[test]
    fn test_gap_free_reader_extends_to_high_id() {
        let source = vec![range_with(0, 1, vec![7])];
        let reader = GapFreeAllEntriesTokenScanReader::new(source.into_iter(), 3 * 64 + 1);
        let ids: Vec<u64> = reader.map(|r| r.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_gap_free_reader_empty_source_and_store() {
        let reader = GapFreeAllEntriesTokenScanReader::new(std::iter::empty(), 0);
        assert_eq!(reader.count(), 0);
    }
}
