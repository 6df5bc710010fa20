//! Dynamic (overflow) block checks, shared by every dynamic store

use std::sync::Arc;

use rayon::prelude::*;

use super::multi_pass::MultiPassStore;
use super::reference::{DeferredReferences, DeferredStats};
use super::{CheckContext, CheckScope, RecordAccess, RecordChecker};
use crate::error::Result;
use crate::report::{InconsistencyKind as K, RecordType};
use crate::store::{DynamicRecord, DynamicStoreKind, NULL_REFERENCE};

/// Checks the blocks of one dynamic store
pub struct DynamicChecker {
    kind: DynamicStoreKind,
    chain: Arc<DeferredReferences<DynamicRecord>>,
}

impl DynamicChecker {
    /// Checker for the `kind` store of `ctx`
    pub fn new(kind: DynamicStoreKind, ctx: &CheckContext) -> Self {
        Self {
            kind,
            chain: Arc::new(DeferredReferences::new(
                kind.name(),
                ctx.stores.dynamic(kind).clone(),
                partition(kind),
            )),
        }
    }

    /// Store checked
    pub fn kind(&self) -> DynamicStoreKind {
        self.kind
    }

    fn check_local(&self, block: &DynamicRecord, ctx: &CheckContext) {
        let record_type = self.kind.record_type();
        let length = block.data.len();
        let capacity = self.kind.block_size();
        if length > capacity {
            ctx.report(record_type, block.id, K::InvalidLength { length });
        }
        if length == 0 {
            ctx.report(record_type, block.id, K::EmptyBlock);
        }
        if block.next == NULL_REFERENCE {
            return;
        }
        if block.next == block.id {
            ctx.report(record_type, block.id, K::SelfReferentialNext);
            return;
        }
        if length < capacity {
            ctx.report(record_type, block.id, K::RecordNotFullReferencesNext);
        }
        if ctx.flags.check_property_owners && ctx.dynamic_owners(self.kind).mark(block.next) {
            ctx.report(
                record_type,
                block.id,
                K::NextBlockMultipleOwners { next: block.next },
            );
        }
    }
}

fn partition(kind: DynamicStoreKind) -> Option<MultiPassStore> {
    match kind {
        DynamicStoreKind::Strings => Some(MultiPassStore::Strings),
        DynamicStoreKind::Arrays => Some(MultiPassStore::Arrays),
        _ => None,
    }
}

impl RecordChecker for DynamicChecker {
    type Record = DynamicRecord;

    fn record_type(&self) -> RecordType {
        self.kind.record_type()
    }

    fn partitions(&self) -> &'static [MultiPassStore] {
        match self.kind {
            DynamicStoreKind::Strings => &[MultiPassStore::Strings],
            DynamicStoreKind::Arrays => &[MultiPassStore::Arrays],
            _ => &[],
        }
    }

    fn pass_started(&self, access: &dyn RecordAccess) {
        self.chain.begin_pass(access);
    }

    fn check(&self, block: &DynamicRecord, scope: &CheckScope<'_>) -> Result<()> {
        if scope.first_pass() {
            self.check_local(block, scope.ctx);
        }
        let id = block.id;
        let next = block.next;
        if next != NULL_REFERENCE && next != id {
            let record_type = self.kind.record_type();
            self.chain
                .reference(scope.access, next)
                .dispatch(scope.ctx, move |target, ctx| {
                    if !target.in_use {
                        ctx.report(record_type, id, K::NextBlockNotInUse { next });
                    } else if target.data.is_empty() {
                        ctx.report(record_type, id, K::EmptyNextBlock { next });
                    }
                })?;
        }
        self.chain.arrive(block, scope.ctx);
        Ok(())
    }

    fn check_deferred(&self, ctx: &CheckContext) -> Result<()> {
        self.chain.finish(ctx)
    }

    /// Every in-use block must have been claimed by an owner or a previous
    /// block by now
    fn complete(&self, ctx: &CheckContext) -> Result<()> {
        if !ctx.flags.check_property_owners || ctx.stop.is_stopped() {
            return Ok(());
        }
        let store = ctx.stores.dynamic(self.kind);
        let owners = ctx.dynamic_owners(self.kind);
        let record_type = self.kind.record_type();
        (0..store.high_id())
            .into_par_iter()
            .filter(|id| !owners.is_marked(*id))
            .try_for_each(|id| -> Result<()> {
                if store.get(id)?.in_use {
                    ctx.report(record_type, id, K::OrphanDynamicRecord);
                }
                Ok(())
            })
    }

    fn deferred_stats(&self) -> DeferredStats {
        self.chain.take_stats()
    }
}
