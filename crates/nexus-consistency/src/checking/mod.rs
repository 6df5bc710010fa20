//! Record checkers and the state they share
//!
//! ```text
//!             CheckingProcessor (one per stage pass)
//!               │ hooks.before
//!               ▼
//! record ──> RecordChecker::check(record, CheckScope)
//!               │        │            │
//!               │        │            └─ RecordAccess ─> RecordReference::dispatch
//!               │        └─ CheckContext: cache, marks, observed counts
//!               └─ ConsistencyReporter
//! ```
//!
//! A checker owns the deferred references into its own store; everything
//! shared across stages lives in [`CheckContext`].

pub mod access;
pub mod cache;
pub mod counts;
pub mod dynamic;
pub mod group;
pub mod index;
pub mod labels;
pub mod meta_data;
pub mod multi_pass;
pub mod node;
pub mod property;
pub mod property_reader;
pub mod reference;
pub mod relationship;
pub mod schema;
pub mod token;
pub mod token_scan;

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ConsistencyFlags;
use crate::error::Result;
use crate::full_check::Stage;
use crate::report::{ConsistencyReporter, InconsistencyKind, RecordType};
use crate::scan::{QueueScope, RecordProcessor, StopControl};
use crate::store::{CountsKey, DynamicStoreKind, Record, StoreAccess};

pub use access::{DirectRecordAccess, FilteringRecordAccess, RecordAccess, TokenCache};
pub use cache::{CacheAccess, NodeCacheEntry, RecordMarks};
pub use multi_pass::{MultiPassStore, PassPlan, plan_passes};
pub use property_reader::{PropertyChainError, PropertyReader};
pub use reference::{DeferredReferences, DeferredStats, PendingReferenceCheck, RecordReference};

/// Observes every record a checker processes
pub trait RecordCheckHook: Send + Sync {
    /// Before the checker runs
    fn before(&self, _stage: Stage, _record_type: RecordType, _id: u64) {}

    /// After the checker returned successfully
    fn after(&self, _stage: Stage, _record_type: RecordType, _id: u64) {}
}

/// State shared by every checker of one run
pub struct CheckContext {
    /// Stores under check
    pub stores: Arc<StoreAccess>,
    /// Single reporting path
    pub reporter: ConsistencyReporter,
    /// Node cells
    pub cache: CacheAccess,
    /// Token records
    pub tokens: Arc<TokenCache>,
    /// Property records referenced as a chain head by some owner
    pub property_owners: RecordMarks,
    dynamic_owners: Vec<RecordMarks>,
    /// Counts derived from the node and relationship stages
    pub observed_counts: DashMap<CountsKey, u64>,
    /// Enabled check families
    pub flags: ConsistencyFlags,
    /// Stop signal of the run
    pub stop: StopControl,
    hooks: Vec<Arc<dyn RecordCheckHook>>,
}

impl CheckContext {
    /// Size the cache and the marks from the stores' high ids and load the tokens
    pub fn new(
        stores: Arc<StoreAccess>,
        reporter: ConsistencyReporter,
        flags: ConsistencyFlags,
        hooks: Vec<Arc<dyn RecordCheckHook>>,
        stop: StopControl,
    ) -> Result<Self> {
        let tokens = Arc::new(TokenCache::load(&stores)?);
        let cache = CacheAccess::new(stores.nodes.high_id());
        let property_owners = RecordMarks::new(stores.properties.high_id());
        let dynamic_owners = DynamicStoreKind::ALL
            .iter()
            .map(|kind| RecordMarks::new(stores.dynamic(*kind).high_id()))
            .collect();
        Ok(Self {
            stores,
            reporter,
            cache,
            tokens,
            property_owners,
            dynamic_owners,
            observed_counts: DashMap::new(),
            flags,
            stop,
            hooks,
        })
    }

    /// The node cache
    pub fn cache_access(&self) -> &CacheAccess {
        &self.cache
    }

    /// Access that resolves everything with direct reads
    pub fn direct_access(&self) -> DirectRecordAccess {
        DirectRecordAccess::new(self.stores.clone(), self.tokens.clone())
    }

    /// Ownership marks of one dynamic store
    pub fn dynamic_owners(&self, kind: DynamicStoreKind) -> &RecordMarks {
        &self.dynamic_owners[kind.index()]
    }

    /// Add one to an observed count
    pub fn count(&self, key: CountsKey) {
        *self.observed_counts.entry(key).or_insert(0) += 1;
    }

    /// Report through the run's reporter
    pub fn report(&self, record_type: RecordType, id: u64, kind: InconsistencyKind) {
        self.reporter.report(record_type, id, kind);
    }
}

/// Everything a checker sees while checking one record
pub struct CheckScope<'a> {
    /// Run state
    pub ctx: &'a CheckContext,
    /// Pass-filtered record access
    pub access: &'a dyn RecordAccess,
    /// Queue the record was delivered to
    pub queue: &'a QueueScope,
}

impl CheckScope<'_> {
    /// Local checks and non-partition references run in this pass
    pub fn first_pass(&self) -> bool {
        self.access.should_check(None)
    }

    /// References into `partition` are resolved in this pass
    pub fn checks(&self, partition: MultiPassStore) -> bool {
        self.access.should_check(Some(partition))
    }
}

/// Checks the records of one store
pub trait RecordChecker: Send + Sync + 'static {
    /// Record kind checked
    type Record: Record;

    /// Record type inconsistencies are filed against by default
    fn record_type(&self) -> RecordType;

    /// Partitions this store references; one pass per partition
    fn partitions(&self) -> &'static [MultiPassStore] {
        &[]
    }

    /// A pass is about to start
    fn pass_started(&self, _access: &dyn RecordAccess) {}

    /// Check one record
    fn check(&self, record: &Self::Record, scope: &CheckScope<'_>) -> Result<()>;

    /// A pass finished scanning: run deferred checks still waiting
    fn check_deferred(&self, _ctx: &CheckContext) -> Result<()> {
        Ok(())
    }

    /// Every pass finished
    fn complete(&self, _ctx: &CheckContext) -> Result<()> {
        Ok(())
    }

    /// Drain deferred reference counters
    fn deferred_stats(&self) -> DeferredStats {
        DeferredStats::default()
    }
}

/// Adapts a checker to the scanners, running hooks around each record
pub struct CheckingProcessor<C: RecordChecker> {
    stage: Stage,
    ctx: Arc<CheckContext>,
    checker: Arc<C>,
    access: Arc<dyn RecordAccess>,
}

impl<C: RecordChecker> CheckingProcessor<C> {
    /// Processor for one pass of `stage`
    pub fn new(
        stage: Stage,
        ctx: Arc<CheckContext>,
        checker: Arc<C>,
        access: Arc<dyn RecordAccess>,
    ) -> Self {
        Self {
            stage,
            ctx,
            checker,
            access,
        }
    }
}

impl<C: RecordChecker> RecordProcessor<C::Record> for CheckingProcessor<C> {
    fn process(&self, record: &C::Record, queue: &QueueScope) -> Result<()> {
        let record_type = self.checker.record_type();
        let id = record.id();
        for hook in &self.ctx.hooks {
            hook.before(self.stage, record_type, id);
        }
        let scope = CheckScope {
            ctx: &self.ctx,
            access: self.access.as_ref(),
            queue,
        };
        self.checker.check(record, &scope)?;
        for hook in &self.ctx.hooks {
            hook.after(self.stage, record_type, id);
        }
        Ok(())
    }
}
