//! Record access for checkers
//!
//! Checkers never read a store directly. They ask a [`RecordAccess`] for a
//! [`RecordReference`], and the access decides whether the pass may resolve
//! it. Token stores are small and read on every record, so they are loaded
//! once into a [`TokenCache`] and served from memory.

use std::sync::Arc;

use super::multi_pass::{MultiPassStore, PassPlan};
use super::reference::RecordReference;
use crate::error::Result;
use crate::store::{
    DynamicRecord, DynamicStoreKind, NO_TOKEN, NodeRecord, PropertyRecord, Record,
    RecordStore, RelationshipGroupRecord, RelationshipRecord, SchemaRecord, StoreAccess,
    TokenKind, TokenRecord,
};

/// The read interface every checker uses
pub trait RecordAccess: Send + Sync {
    /// True if references into `partition` are resolved in the current pass;
    /// `None` stands for local checks and stores that are not a partition
    fn should_check(&self, partition: Option<MultiPassStore>) -> bool;

    /// Node record
    fn node(&self, id: u64) -> Result<RecordReference<NodeRecord>>;

    /// Relationship record
    fn relationship(&self, id: u64) -> Result<RecordReference<RelationshipRecord>>;

    /// Relationship group record
    fn group(&self, id: u64) -> Result<RecordReference<RelationshipGroupRecord>>;

    /// Property record
    fn property(&self, id: u64) -> Result<RecordReference<PropertyRecord>>;

    /// Block of a dynamic store
    fn dynamic(&self, kind: DynamicStoreKind, id: u64) -> Result<RecordReference<DynamicRecord>>;

    /// Schema record
    fn schema(&self, id: u64) -> Result<RecordReference<SchemaRecord>>;

    /// Token record
    fn token(&self, kind: TokenKind, id: u32) -> RecordReference<TokenRecord>;
}

/// Every token record, loaded once per run
#[derive(Debug, Default)]
pub struct TokenCache {
    labels: Vec<TokenRecord>,
    property_keys: Vec<TokenRecord>,
    relationship_types: Vec<TokenRecord>,
}

impl TokenCache {
    /// Read the three token stores
    pub fn load(stores: &StoreAccess) -> Result<Self> {
        let read = |store: &dyn RecordStore<TokenRecord>| -> Result<Vec<TokenRecord>> {
            (0..store.high_id()).map(|id| store.get(id)).collect()
        };
        Ok(Self {
            labels: read(stores.labels.as_ref())?,
            property_keys: read(stores.property_keys.as_ref())?,
            relationship_types: read(stores.relationship_types.as_ref())?,
        })
    }

    fn tokens(&self, kind: TokenKind) -> &[TokenRecord] {
        match kind {
            TokenKind::Label => &self.labels,
            TokenKind::PropertyKey => &self.property_keys,
            TokenKind::RelationshipType => &self.relationship_types,
        }
    }

    /// Token record; unknown ids read as not in use
    pub fn get(&self, kind: TokenKind, id: u32) -> TokenRecord {
        self.tokens(kind)
            .get(id as usize)
            .cloned()
            .unwrap_or_else(|| TokenRecord::unused(id as u64))
    }

    /// Token id is in use
    pub fn in_use(&self, kind: TokenKind, id: u32) -> bool {
        id != NO_TOKEN && self.tokens(kind).get(id as usize).is_some_and(|t| t.in_use)
    }

    /// Cached token count
    pub fn len(&self) -> usize {
        self.labels.len() + self.property_keys.len() + self.relationship_types.len()
    }

    /// Nothing cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves every reference with a direct read
#[derive(Clone)]
pub struct DirectRecordAccess {
    stores: Arc<StoreAccess>,
    tokens: Arc<TokenCache>,
}

impl DirectRecordAccess {
    /// Access over `stores`, serving tokens from `tokens`
    pub fn new(stores: Arc<StoreAccess>, tokens: Arc<TokenCache>) -> Self {
        Self { stores, tokens }
    }
}

impl RecordAccess for DirectRecordAccess {
    fn should_check(&self, _partition: Option<MultiPassStore>) -> bool {
        true
    }

    fn node(&self, id: u64) -> Result<RecordReference<NodeRecord>> {
        Ok(RecordReference::Resolved(self.stores.nodes.get(id)?))
    }

    fn relationship(&self, id: u64) -> Result<RecordReference<RelationshipRecord>> {
        Ok(RecordReference::Resolved(self.stores.relationships.get(id)?))
    }

    fn group(&self, id: u64) -> Result<RecordReference<RelationshipGroupRecord>> {
        Ok(RecordReference::Resolved(
            self.stores.relationship_groups.get(id)?,
        ))
    }

    fn property(&self, id: u64) -> Result<RecordReference<PropertyRecord>> {
        Ok(RecordReference::Resolved(self.stores.properties.get(id)?))
    }

    fn dynamic(&self, kind: DynamicStoreKind, id: u64) -> Result<RecordReference<DynamicRecord>> {
        Ok(RecordReference::Resolved(self.stores.dynamic(kind).get(id)?))
    }

    fn schema(&self, id: u64) -> Result<RecordReference<SchemaRecord>> {
        Ok(RecordReference::Resolved(self.stores.schema.get(id)?))
    }

    fn token(&self, kind: TokenKind, id: u32) -> RecordReference<TokenRecord> {
        RecordReference::Resolved(self.tokens.get(kind, id))
    }
}

/// Resolves only what the current pass owns
///
/// A reference outside the pass's partition comes back as
/// [`RecordReference::Skip`] without touching the store.
#[derive(Clone)]
pub struct FilteringRecordAccess {
    inner: DirectRecordAccess,
    plan: PassPlan,
}

impl FilteringRecordAccess {
    /// Filter `inner` through `plan`
    pub fn new(inner: DirectRecordAccess, plan: PassPlan) -> Self {
        Self { inner, plan }
    }

    /// The pass this access serves
    pub fn plan(&self) -> PassPlan {
        self.plan
    }

    fn filtered<R: Record>(
        &self,
        partition: Option<MultiPassStore>,
        read: impl FnOnce() -> Result<RecordReference<R>>,
    ) -> Result<RecordReference<R>> {
        if self.plan.should_check(partition) {
            read()
        } else {
            Ok(RecordReference::Skip)
        }
    }
}

fn dynamic_partition(kind: DynamicStoreKind) -> Option<MultiPassStore> {
    match kind {
        DynamicStoreKind::Strings => Some(MultiPassStore::Strings),
        DynamicStoreKind::Arrays => Some(MultiPassStore::Arrays),
        _ => None,
    }
}

impl RecordAccess for FilteringRecordAccess {
    fn should_check(&self, partition: Option<MultiPassStore>) -> bool {
        self.plan.should_check(partition)
    }

    fn node(&self, id: u64) -> Result<RecordReference<NodeRecord>> {
        self.filtered(Some(MultiPassStore::Nodes), || self.inner.node(id))
    }

    fn relationship(&self, id: u64) -> Result<RecordReference<RelationshipRecord>> {
        self.filtered(Some(MultiPassStore::Relationships), || {
            self.inner.relationship(id)
        })
    }

    fn group(&self, id: u64) -> Result<RecordReference<RelationshipGroupRecord>> {
        self.filtered(None, || self.inner.group(id))
    }

    fn property(&self, id: u64) -> Result<RecordReference<PropertyRecord>> {
        self.filtered(Some(MultiPassStore::Properties), || self.inner.property(id))
    }

    fn dynamic(&self, kind: DynamicStoreKind, id: u64) -> Result<RecordReference<DynamicRecord>> {
        self.filtered(dynamic_partition(kind), || self.inner.dynamic(kind, id))
    }

    fn schema(&self, id: u64) -> Result<RecordReference<SchemaRecord>> {
        self.filtered(None, || self.inner.schema(id))
    }

    fn token(&self, kind: TokenKind, id: u32) -> RecordReference<TokenRecord> {
        if self.plan.should_check(None) {
            self.inner.token(kind, id)
        } else {
            RecordReference::Skip
        }
    }
}
