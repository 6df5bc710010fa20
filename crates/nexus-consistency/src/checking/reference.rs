//! Lazy record references and deferred comparisons
//!
//! Checking record A often means comparing it with record B. When B lives
//! in another store it is read right away. When B lives in the store being
//! scanned, B may be in another queue, ahead of or behind A, so the
//! comparison is parked under B's id and runs when B arrives.
//!
//! ```text
//! A checked ──register(B, check)──> pending[B]
//!                                      │
//! B scanned ──arrive(B)──────────────> run pending[B] with B
//!
//! end of pass ──finish──> read every B that never arrived, run its checks
//! ```
//!
//! A target that never arrives was not in use (scans only yield in-use
//! records), so the direct read in `finish` hands the check a not-in-use
//! record and the check reports the dangling pointer itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use roaring::RoaringTreemap;

use super::CheckContext;
use super::access::RecordAccess;
use super::multi_pass::MultiPassStore;
use crate::error::Result;
use crate::store::{Record, Store};

/// A comparison waiting for its target record
pub type PendingReferenceCheck<R> = Box<dyn FnOnce(&R, &CheckContext) + Send>;

const SHARDS: usize = 64;

/// Handle to a referenced record
pub enum RecordReference<R: Record> {
    /// Already read
    Resolved(R),
    /// Not checked in this pass
    Skip,
    /// Target is in the store being scanned
    Deferred {
        /// Target id
        id: u64,
        /// Where the check waits
        registry: Arc<DeferredReferences<R>>,
    },
}

impl<R: Record> RecordReference<R> {
    /// Run `check` against the target now, later, or never (for
    /// [`RecordReference::Skip`])
    pub fn dispatch(
        self,
        ctx: &CheckContext,
        check: impl FnOnce(&R, &CheckContext) + Send + 'static,
    ) -> Result<()> {
        match self {
            Self::Resolved(record) => {
                check(&record, ctx);
                Ok(())
            }
            Self::Skip => Ok(()),
            Self::Deferred { id, registry } => {
                if let Some(check) = registry.register(id, Box::new(check)) {
                    let record = registry.store.get(id)?;
                    check(&record, ctx);
                }
                Ok(())
            }
        }
    }

    /// True for [`RecordReference::Skip`]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

/// Counters of one registry, drained after each stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeferredStats {
    /// Checks registered against a target not yet seen
    pub registered: u64,
    /// Checks run when their target arrived
    pub resolved_on_arrival: u64,
    /// Checks run with a direct read because the target had already arrived
    pub resolved_directly: u64,
    /// Checks whose target never arrived
    pub dangling: u64,
}

impl DeferredStats {
    /// Field-wise sum
    pub fn merge(self, other: DeferredStats) -> DeferredStats {
        DeferredStats {
            registered: self.registered + other.registered,
            resolved_on_arrival: self.resolved_on_arrival + other.resolved_on_arrival,
            resolved_directly: self.resolved_directly + other.resolved_directly,
            dangling: self.dangling + other.dangling,
        }
    }
}

struct Shard<R> {
    pending: HashMap<u64, Vec<PendingReferenceCheck<R>>>,
    arrived: RoaringTreemap,
}

impl<R> Shard<R> {
    fn new() -> Self {
        Self {
            pending: HashMap::new(),
            arrived: RoaringTreemap::new(),
        }
    }
}

/// Pending checks against the records of one store, keyed by target id
pub struct DeferredReferences<R: Record> {
    name: &'static str,
    store: Store<R>,
    partition: Option<MultiPassStore>,
    shards: Vec<Mutex<Shard<R>>>,
    active: AtomicBool,
    registered: AtomicU64,
    on_arrival: AtomicU64,
    direct: AtomicU64,
    dangling: AtomicU64,
}

impl<R: Record> DeferredReferences<R> {
    /// Registry over `store`, resolved in passes that check `partition`
    pub fn new(name: &'static str, store: Store<R>, partition: Option<MultiPassStore>) -> Self {
        Self {
            name,
            store,
            partition,
            shards: (0..SHARDS).map(|_| Mutex::new(Shard::new())).collect(),
            active: AtomicBool::new(false),
            registered: AtomicU64::new(0),
            on_arrival: AtomicU64::new(0),
            direct: AtomicU64::new(0),
            dangling: AtomicU64::new(0),
        }
    }

    fn shard(&self, id: u64) -> &Mutex<Shard<R>> {
        &self.shards[(id % SHARDS as u64) as usize]
    }

    /// Reference to `id`, or [`RecordReference::Skip`] when the pass does
    /// not check this registry's partition
    pub fn reference(self: &Arc<Self>, access: &dyn RecordAccess, id: u64) -> RecordReference<R> {
        if self.active.load(Ordering::Acquire) && access.should_check(self.partition) {
            RecordReference::Deferred {
                id,
                registry: self.clone(),
            }
        } else {
            RecordReference::Skip
        }
    }

    /// Reset for a new pass; the registry is active only if the pass
    /// checks its partition
    pub fn begin_pass(&self, access: &dyn RecordAccess) {
        for shard in &self.shards {
            *shard.lock() = Shard::new();
        }
        self.active
            .store(access.should_check(self.partition), Ordering::Release);
    }

    /// Park `check` under `id`. Hands the check back when `id` has already
    /// arrived; the caller then reads the target directly.
    pub fn register(
        &self,
        id: u64,
        check: PendingReferenceCheck<R>,
    ) -> Option<PendingReferenceCheck<R>> {
        let mut shard = self.shard(id).lock();
        if shard.arrived.contains(id) {
            self.direct.fetch_add(1, Ordering::Relaxed);
            return Some(check);
        }
        shard.pending.entry(id).or_default().push(check);
        self.registered.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// `record` has been scanned: run everything waiting for it
    pub fn arrive(&self, record: &R, ctx: &CheckContext) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let id = record.id();
        let waiting = {
            let mut shard = self.shard(id).lock();
            shard.arrived.insert(id);
            shard.pending.remove(&id)
        };
        if let Some(checks) = waiting {
            self.on_arrival
                .fetch_add(checks.len() as u64, Ordering::Relaxed);
            for check in checks {
                check(record, ctx);
            }
        }
    }

    /// End of pass: resolve checks whose target never arrived
    pub fn finish(&self, ctx: &CheckContext) -> Result<()> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let mut leftover: Vec<(u64, Vec<PendingReferenceCheck<R>>)> = Vec::new();
        for shard in &self.shards {
            let mut shard = shard.lock();
            leftover.extend(shard.pending.drain());
            shard.arrived.clear();
        }
        if ctx.stop.is_stopped() {
            return Ok(());
        }
        leftover.sort_unstable_by_key(|(id, _)| *id);
        let mut dangling = 0u64;
        for (id, checks) in leftover {
            let record = self.store.get(id)?;
            dangling += checks.len() as u64;
            for check in checks {
                check(&record, ctx);
            }
        }
        if dangling > 0 {
            tracing::debug!("{}: {} deferred checks never saw their target", self.name, dangling);
        }
        self.dangling.fetch_add(dangling, Ordering::Relaxed);
        Ok(())
    }

    /// Take and reset the counters
    pub fn take_stats(&self) -> DeferredStats {
        DeferredStats {
            registered: self.registered.swap(0, Ordering::Relaxed),
            resolved_on_arrival: self.on_arrival.swap(0, Ordering::Relaxed),
            resolved_directly: self.direct.swap(0, Ordering::Relaxed),
            dangling: self.dangling.swap(0, Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checking::access::FilteringRecordAccess;
    use crate::checking::multi_pass::PassPlan;
    use crate::report::{InconsistencyKind, RecordType};
    use crate::store::{MemoryStore, PropertyRecord, Record};
    use crate::testing::GraphStoreFixture;

    fn property(id: u64, in_use: bool) -> PropertyRecord {
        PropertyRecord {
            in_use,
            ..PropertyRecord::unused(id)
        }
    }

    fn setup() -> (
        GraphStoreFixture,
        Arc<CheckContext>,
        Arc<DeferredReferences<PropertyRecord>>,
    ) {
        let fixture = GraphStoreFixture::new();
        let store = Arc::new(MemoryStore::new());
        store.write(property(1, true));
        store.write(property(2, true));
        store.write(property(3, false));
        let ctx = fixture.check_context();
        let registry = Arc::new(DeferredReferences::new(
            "properties",
            store as Store<PropertyRecord>,
            Some(MultiPassStore::Properties),
        ));
        (fixture, ctx, registry)
    }

    fn report_not_in_use(target: &PropertyRecord, ctx: &CheckContext) {
        if !target.in_use {
            ctx.reporter.report(
                RecordType::Property,
                0,
                InconsistencyKind::NextPropertyNotInUse { next: target.id },
            );
        }
    }

    #[test]
    fn test_check_runs_on_arrival() {
        let (_fixture, ctx, registry) = setup();
        let access = FilteringRecordAccess::new(ctx.direct_access(), PassPlan::unfiltered());
        registry.begin_pass(&access);
        registry
            .reference(&access, 2)
            .dispatch(&ctx, report_not_in_use)
            .unwrap();
        registry.arrive(&property(2, true), &ctx);
        registry.finish(&ctx).unwrap();

        let stats = registry.take_stats();
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.resolved_on_arrival, 1);
        assert_eq!(stats.dangling, 0);
        assert!(ctx.reporter.summary().is_consistent());
    }

    #[test]
    fn test_late_registration_reads_directly() {
        let (_fixture, ctx, registry) = setup();
        let access = FilteringRecordAccess::new(ctx.direct_access(), PassPlan::unfiltered());
        registry.begin_pass(&access);
        registry.arrive(&property(1, true), &ctx);
        registry
            .reference(&access, 1)
            .dispatch(&ctx, report_not_in_use)
            .unwrap();
        assert_eq!(registry.take_stats().resolved_directly, 1);
    }

    #[test]
    fn test_dangling_target_reported_at_finish() {
        let (_fixture, ctx, registry) = setup();
        let access = FilteringRecordAccess::new(ctx.direct_access(), PassPlan::unfiltered());
        registry.begin_pass(&access);
        registry
            .reference(&access, 3)
            .dispatch(&ctx, report_not_in_use)
            .unwrap();
        assert!(ctx.reporter.summary().is_consistent());
        registry.finish(&ctx).unwrap();
        assert_eq!(registry.take_stats().dangling, 1);
        assert_eq!(
            ctx.reporter
                .summary()
                .inconsistency_count_for_record_type(RecordType::Property),
            1
        );
    }

    #[test]
    fn test_other_partition_pass_skips() {
        let (_fixture, ctx, registry) = setup();
        let access = FilteringRecordAccess::new(
            ctx.direct_access(),
            PassPlan {
                partition: Some(MultiPassStore::Nodes),
                first_pass: true,
            },
        );
        registry.begin_pass(&access);
        assert!(registry.reference(&access, 3).is_skip());
        registry.finish(&ctx).unwrap();
        assert_eq!(registry.take_stats(), DeferredStats::default());
    }
}
