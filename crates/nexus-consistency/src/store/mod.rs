//! Read-only store boundary
//!
//! The checker never writes to a store. Each store is a dense, randomly
//! addressable array of fixed-size slots; reading past the high id yields a
//! not-in-use record rather than an error, the same answer a physical store
//! gives for a slot that was never written.
//!
//! ```text
//! StoreAccess
//! ├── nodes / relationships / relationship_groups / properties
//! ├── dynamic: strings, arrays, node labels, token names
//! ├── tokens: labels, property keys, relationship types
//! ├── schema + meta data
//! └── counts, label / type scan stores, indexes
//! ```

pub mod counts;
pub mod index;
pub mod record;
pub mod token_scan;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::report::RecordType;

pub use counts::{CountsKey, CountsStore, MemoryCountsStore};
pub use index::{IndexAccessor, IndexDescriptor, IndexEntry, IndexState, MemoryIndex};
pub use record::*;
pub use token_scan::{
    ENTITIES_PER_RANGE, EntityTokenRange, GapFreeAllEntriesTokenScanReader, MemoryTokenScanStore,
    TokenScanReader,
};

/// Iterator with a known upper bound on the records it yields
pub struct BoundedIterable<'a, R> {
    iter: Box<dyn Iterator<Item = Result<R>> + 'a>,
    max_count: u64,
}

impl<'a, R> BoundedIterable<'a, R> {
    /// Wrap an iterator
    pub fn new(iter: impl Iterator<Item = Result<R>> + 'a, max_count: u64) -> Self {
        Self {
            iter: Box::new(iter),
            max_count,
        }
    }

    /// Upper bound used for progress reporting
    pub fn max_count(&self) -> u64 {
        self.max_count
    }
}

impl<R> Iterator for BoundedIterable<'_, R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

/// Random-access, read-only record store
pub trait RecordStore<R: Record>: Send + Sync {
    /// Read a record; ids at or past [`high_id`](Self::high_id) are not in use
    fn get(&self, id: u64) -> Result<R>;

    /// One past the highest id ever allocated
    fn high_id(&self) -> u64;

    /// Highest id whose record is in use, if any
    fn highest_id_in_use(&self) -> Option<u64> {
        (0..self.high_id()).rev().find(|&id| matches!(self.get(id), Ok(r) if r.in_use()))
    }

    /// In-use records in increasing id order
    fn scan(&self) -> BoundedIterable<'_, R> {
        let high_id = self.high_id();
        let iter = (0..high_id)
            .map(move |id| self.get(id))
            .filter(|r| !matches!(r, Ok(record) if !record.in_use()));
        BoundedIterable::new(iter, high_id)
    }
}

/// Store backed by a vector, used by fixtures and tests
#[derive(Debug)]
pub struct MemoryStore<R> {
    records: RwLock<Vec<R>>,
}

impl<R: Record> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> MemoryStore<R> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Next id that [`write`](Self::write) would append at
    pub fn next_id(&self) -> u64 {
        self.records.read().len() as u64
    }

    /// Write a record at its id, growing the store with unused slots as needed
    pub fn write(&self, record: R) {
        let mut records = self.records.write();
        let id = record.id() as usize;
        while records.len() <= id {
            let filler = records.len() as u64;
            records.push(R::unused(filler));
        }
        records[id] = record;
    }

    /// Apply an in-place change to a stored record
    pub fn update(&self, id: u64, change: impl FnOnce(&mut R)) {
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(id as usize) {
            change(record);
        }
    }
}

impl<R: Record> RecordStore<R> for MemoryStore<R> {
    fn get(&self, id: u64) -> Result<R> {
        let records = self.records.read();
        Ok(records
            .get(id as usize)
            .cloned()
            .unwrap_or_else(|| R::unused(id)))
    }

    fn high_id(&self) -> u64 {
        self.records.read().len() as u64
    }
}

/// The dynamic (overflow) stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicStoreKind {
    /// Long string property values
    Strings,
    /// Array property values
    Arrays,
    /// Node label lists too long to inline
    NodeLabels,
    /// Label token names
    LabelNames,
    /// Property key token names
    PropertyKeyNames,
    /// Relationship type token names
    RelationshipTypeNames,
}

impl DynamicStoreKind {
    /// Every dynamic store
    pub const ALL: [DynamicStoreKind; 6] = [
        Self::Strings,
        Self::Arrays,
        Self::NodeLabels,
        Self::LabelNames,
        Self::PropertyKeyNames,
        Self::RelationshipTypeNames,
    ];

    /// Position in [`DynamicStoreKind::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Payload capacity of one block
    pub fn block_size(self) -> usize {
        match self {
            Self::Strings => STRING_BLOCK_SIZE,
            Self::Arrays => ARRAY_BLOCK_SIZE,
            Self::NodeLabels => LABEL_BLOCK_SIZE,
            Self::LabelNames | Self::PropertyKeyNames | Self::RelationshipTypeNames => {
                NAME_BLOCK_SIZE
            }
        }
    }

    /// Record type used when reporting blocks of this store
    pub fn record_type(self) -> RecordType {
        match self {
            Self::Strings => RecordType::StringProperty,
            Self::Arrays => RecordType::ArrayProperty,
            Self::NodeLabels => RecordType::NodeDynamicLabel,
            Self::LabelNames => RecordType::LabelName,
            Self::PropertyKeyNames => RecordType::PropertyKeyName,
            Self::RelationshipTypeNames => RecordType::RelationshipTypeName,
        }
    }

    /// Store name for logs and progress
    pub fn name(self) -> &'static str {
        match self {
            Self::Strings => "string store",
            Self::Arrays => "array store",
            Self::NodeLabels => "node dynamic label store",
            Self::LabelNames => "label name store",
            Self::PropertyKeyNames => "property key name store",
            Self::RelationshipTypeNames => "relationship type name store",
        }
    }
}

/// The token stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Node labels
    Label,
    /// Property keys
    PropertyKey,
    /// Relationship types
    RelationshipType,
}

impl TokenKind {
    /// Every token store
    pub const ALL: [TokenKind; 3] = [Self::Label, Self::PropertyKey, Self::RelationshipType];

    /// Store holding the token names
    pub fn name_store(self) -> DynamicStoreKind {
        match self {
            Self::Label => DynamicStoreKind::LabelNames,
            Self::PropertyKey => DynamicStoreKind::PropertyKeyNames,
            Self::RelationshipType => DynamicStoreKind::RelationshipTypeNames,
        }
    }

    /// Record type used when reporting tokens of this store
    pub fn record_type(self) -> RecordType {
        match self {
            Self::Label => RecordType::Label,
            Self::PropertyKey => RecordType::PropertyKey,
            Self::RelationshipType => RecordType::RelationshipType,
        }
    }
}

/// Typed store handles
pub type Store<R> = Arc<dyn RecordStore<R>>;

/// Every store the checker reads, shared read-only by all workers
pub struct StoreAccess {
    /// Node store
    pub nodes: Store<NodeRecord>,
    /// Relationship store
    pub relationships: Store<RelationshipRecord>,
    /// Relationship group store
    pub relationship_groups: Store<RelationshipGroupRecord>,
    /// Property store
    pub properties: Store<PropertyRecord>,
    /// Dynamic string store
    pub strings: Store<DynamicRecord>,
    /// Dynamic array store
    pub arrays: Store<DynamicRecord>,
    /// Dynamic node label store
    pub node_labels: Store<DynamicRecord>,
    /// Label tokens
    pub labels: Store<TokenRecord>,
    /// Label token names
    pub label_names: Store<DynamicRecord>,
    /// Property key tokens
    pub property_keys: Store<TokenRecord>,
    /// Property key token names
    pub property_key_names: Store<DynamicRecord>,
    /// Relationship type tokens
    pub relationship_types: Store<TokenRecord>,
    /// Relationship type token names
    pub relationship_type_names: Store<DynamicRecord>,
    /// Schema rules
    pub schema: Store<SchemaRecord>,
    /// Neostore metadata record
    pub meta_data: MetaDataRecord,
    /// Counts store
    pub counts: Arc<dyn CountsStore>,
    /// Node label scan store
    pub label_scan: Option<Arc<dyn TokenScanReader>>,
    /// Relationship type scan store
    pub relationship_type_scan: Option<Arc<dyn TokenScanReader>>,
    /// Schema indexes
    pub indexes: Vec<(IndexDescriptor, Arc<dyn IndexAccessor>)>,
}

impl StoreAccess {
    /// Dynamic store by kind
    pub fn dynamic(&self, kind: DynamicStoreKind) -> &Store<DynamicRecord> {
        match kind {
            DynamicStoreKind::Strings => &self.strings,
            DynamicStoreKind::Arrays => &self.arrays,
            DynamicStoreKind::NodeLabels => &self.node_labels,
            DynamicStoreKind::LabelNames => &self.label_names,
            DynamicStoreKind::PropertyKeyNames => &self.property_key_names,
            DynamicStoreKind::RelationshipTypeNames => &self.relationship_type_names,
        }
    }

    /// Token store by kind
    pub fn tokens(&self, kind: TokenKind) -> &Store<TokenRecord> {
        match kind {
            TokenKind::Label => &self.labels,
            TokenKind::PropertyKey => &self.property_keys,
            TokenKind::RelationshipType => &self.relationship_types,
        }
    }
}
