//! Property records and the property chains of their owners

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use super::multi_pass::MultiPassStore;
use super::property_reader::{PropertyChainError, PropertyReader};
use super::reference::{DeferredReferences, DeferredStats, RecordReference};
use super::{CheckContext, CheckScope, RecordAccess, RecordChecker};
use crate::error::Result;
use crate::report::{DynamicValueKind, InconsistencyKind as K, RecordType};
use crate::store::{
    DynamicStoreKind, NO_TOKEN, NULL_REFERENCE, PropertyRecord, PropertyType, TokenKind,
};

/// Check the property chain hanging off a node, relationship or the
/// neostore record
///
/// The head must be in use and first in its chain, must have no other owner,
/// and no key may appear twice anywhere in the chain. A chain that loops is
/// filed against the property record closing the loop.
pub(crate) fn check_owner_properties(
    owner_type: RecordType,
    owner_id: u64,
    first: u64,
    scope: &CheckScope<'_>,
) -> Result<()> {
    if first == NULL_REFERENCE {
        return Ok(());
    }
    let head = match scope.access.property(first)? {
        RecordReference::Resolved(head) => head,
        _ => return Ok(()),
    };
    let ctx = scope.ctx;
    if !head.in_use {
        ctx.report(owner_type, owner_id, K::PropertyNotInUse { property: first });
        return Ok(());
    }
    if head.prev_prop != NULL_REFERENCE {
        ctx.report(owner_type, owner_id, K::PropertyNotFirstInChain { property: first });
    }
    if ctx.flags.check_property_owners && ctx.property_owners.mark(first) {
        ctx.report(RecordType::Property, first, K::PropertyChainMultipleOwners);
    }

    match PropertyReader::new(&ctx.stores).property_record_chain(first) {
        Ok(chain) => {
            let mut keys = HashSet::new();
            let mut duplicates = BTreeSet::new();
            for block in chain.iter().flat_map(|record| record.blocks.iter()) {
                if !keys.insert(block.key) {
                    duplicates.insert(block.key);
                }
            }
            for key in duplicates {
                ctx.report(owner_type, owner_id, K::PropertyKeyNotUniqueInChain { key });
            }
        }
        Err(PropertyChainError::Circular { record }) => {
            ctx.report(RecordType::Property, record, K::CircularPropertyChain);
        }
        Err(PropertyChainError::Store(e)) => return Err(e),
    }
    Ok(())
}

/// Checks property records
pub struct PropertyChecker {
    chain: Arc<DeferredReferences<PropertyRecord>>,
}

impl PropertyChecker {
    /// Checker resolving chain neighbours through `ctx`'s property store
    pub fn new(ctx: &CheckContext) -> Self {
        Self {
            chain: Arc::new(DeferredReferences::new(
                "property chain",
                ctx.stores.properties.clone(),
                Some(MultiPassStore::Properties),
            )),
        }
    }

    fn check_blocks(&self, record: &PropertyRecord, ctx: &CheckContext) {
        for (i, block) in record.blocks.iter().enumerate() {
            if block.key == NO_TOKEN {
                ctx.report(RecordType::Property, record.id, K::IllegalPropertyKey { block: i });
            } else if !ctx.tokens.in_use(TokenKind::PropertyKey, block.key) {
                ctx.report(
                    RecordType::Property,
                    record.id,
                    K::PropertyKeyNotInUse { key: block.key },
                );
            }
            if block.property_type().is_none() {
                ctx.report(
                    RecordType::Property,
                    record.id,
                    K::InvalidPropertyType {
                        key: block.key,
                        type_tag: block.type_tag,
                    },
                );
            }
        }
    }

    fn check_neighbours(&self, record: &PropertyRecord, scope: &CheckScope<'_>) -> Result<()> {
        let id = record.id;
        let prev = record.prev_prop;
        if prev != NULL_REFERENCE {
            self.chain
                .reference(scope.access, prev)
                .dispatch(scope.ctx, move |target, ctx| {
                    if !target.in_use {
                        ctx.report(RecordType::Property, id, K::PrevPropertyNotInUse { prev });
                    } else if target.next_prop != id {
                        ctx.report(
                            RecordType::Property,
                            id,
                            K::PrevPropertyDoesNotReferenceBack { prev },
                        );
                    }
                })?;
        }
        let next = record.next_prop;
        if next != NULL_REFERENCE {
            self.chain
                .reference(scope.access, next)
                .dispatch(scope.ctx, move |target, ctx| {
                    if !target.in_use {
                        ctx.report(RecordType::Property, id, K::NextPropertyNotInUse { next });
                    } else if target.prev_prop != id {
                        ctx.report(
                            RecordType::Property,
                            id,
                            K::NextPropertyDoesNotReferenceBack { next },
                        );
                    }
                })?;
        }
        Ok(())
    }

    fn check_values(&self, record: &PropertyRecord, scope: &CheckScope<'_>) -> Result<()> {
        for block in &record.blocks {
            let (store, kind) = match block.property_type() {
                Some(PropertyType::String) => (DynamicStoreKind::Strings, DynamicValueKind::String),
                Some(PropertyType::Array) => (DynamicStoreKind::Arrays, DynamicValueKind::Array),
                _ => continue,
            };
            let id = record.id;
            let key = block.key;
            let value = block.value;
            scope
                .access
                .dynamic(store, value)?
                .dispatch(scope.ctx, move |target, ctx| {
                    if !target.in_use {
                        ctx.report(
                            RecordType::Property,
                            id,
                            K::DynamicValueNotInUse { key, kind, record: value },
                        );
                        return;
                    }
                    if target.data.is_empty() {
                        ctx.report(
                            RecordType::Property,
                            id,
                            K::DynamicValueEmpty { key, kind, record: value },
                        );
                    }
                    if ctx.flags.check_property_owners && ctx.dynamic_owners(store).mark(value) {
                        ctx.report(
                            RecordType::Property,
                            id,
                            K::DynamicValueMultipleOwners { key, kind, record: value },
                        );
                    }
                })?;
        }
        Ok(())
    }
}

impl RecordChecker for PropertyChecker {
    type Record = PropertyRecord;

    fn record_type(&self) -> RecordType {
        RecordType::Property
    }

    fn partitions(&self) -> &'static [MultiPassStore] {
        &[
            MultiPassStore::Properties,
            MultiPassStore::Strings,
            MultiPassStore::Arrays,
        ]
    }

    fn pass_started(&self, access: &dyn RecordAccess) {
        self.chain.begin_pass(access);
    }

    fn check(&self, record: &PropertyRecord, scope: &CheckScope<'_>) -> Result<()> {
        let ctx = scope.ctx;
        if scope.first_pass() {
            self.check_blocks(record, ctx);
            if ctx.flags.check_property_owners
                && record.prev_prop == NULL_REFERENCE
                && !ctx.property_owners.is_marked(record.id)
            {
                ctx.report(RecordType::Property, record.id, K::OrphanPropertyChain);
            }
        }
        if scope.checks(MultiPassStore::Properties) {
            self.check_neighbours(record, scope)?;
            self.chain.arrive(record, ctx);
        }
        if scope.checks(MultiPassStore::Strings) || scope.checks(MultiPassStore::Arrays) {
            self.check_values(record, scope)?;
        }
        Ok(())
    }

    fn check_deferred(&self, ctx: &CheckContext) -> Result<()> {
        self.chain.finish(ctx)
    }

    fn deferred_stats(&self) -> DeferredStats {
        self.chain.take_stats()
    }
}
