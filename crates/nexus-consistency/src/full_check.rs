//! Scan coordinator
//!
//! Runs every stage of a full check against one set of stores, in an order
//! where each stage can rely on what the earlier ones established:
//!
//! ```text
//! NodeStore ─> NeoStore ─> RelationshipStore ─> NodeRelationshipCache (sweep)
//!    │ fills the node cache      │ degrees, back-references
//!    ▼                           ▼
//! RelationshipGroupStore ─> PropertyStore ─> String/Array/NodeDynamicLabel stores
//!                              │ marks chain owners      │ orphan sweeps
//!                              ▼                         ▼
//! SchemaStore ─> TokenStores ─> TokenNameStores ─> Counts
//!                                                    │
//! LabelScanStore ─> RelationshipTypeScanStore ─> Indexes
//! ```
//!
//! A stage is one or more scans. Each scan runs once per pass planned from
//! the partitions its checker references, followed by the checker's
//! deferred checks; the checker is completed after its last pass.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::checking::counts::check_counts;
use crate::checking::dynamic::DynamicChecker;
use crate::checking::group::RelationshipGroupChecker;
use crate::checking::index::{IndexEntryChecker, IndexNodeChecker};
use crate::checking::meta_data::MetaDataChecker;
use crate::checking::node::NodeChecker;
use crate::checking::property::PropertyChecker;
use crate::checking::relationship::{RelationshipChecker, check_node_relationship_cache};
use crate::checking::schema::SchemaChecker;
use crate::checking::token::TokenChecker;
use crate::checking::token_scan::{ScanEntity, TokenScanChecker};
use crate::checking::{
    CheckContext, CheckingProcessor, DeferredStats, FilteringRecordAccess, RecordCheckHook,
    RecordChecker, plan_passes,
};
use crate::config::{CheckConfig, Distribution};
use crate::error::{Error, Result};
use crate::progress::{
    CacheStatistics, CacheStatsSink, LoggingCacheStats, LoggingProgress, ProgressMonitorFactory,
};
use crate::report::{
    ConsistencyReporter, ConsistencySummaryStatistics, FanOutSink, InconsistencySink,
    ReportFileSink,
};
use crate::scan::{
    ParallelRecordScanner, QueueDistributor, RecordProcessor, RelationshipNodesQueueDistributor,
    RoundRobinQueueDistributor, SequentialRecordScanner, StopControl, WorkerSettings,
};
use crate::store::{
    BoundedIterable, DynamicStoreKind, GapFreeAllEntriesTokenScanReader, IndexAccessor,
    IndexDescriptor, IndexEntry, IndexState, MetaDataRecord, RelationshipRecord,
    TokenKind, TokenScanReader,
};

/// Stages of a full check, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Node records
    NodeStore,
    /// The neostore record and the graph property chain
    NeoStore,
    /// Relationship records
    RelationshipStore,
    /// Per-node sweep of degrees and first relationships
    NodeRelationshipCache,
    /// Relationship group records
    RelationshipGroupStore,
    /// Property records
    PropertyStore,
    /// Dynamic string blocks
    StringStore,
    /// Dynamic array blocks
    ArrayStore,
    /// Dynamic node label blocks
    NodeDynamicLabelStore,
    /// Schema rules
    SchemaStore,
    /// Label, property key and relationship type tokens
    TokenStores,
    /// Token name blocks
    TokenNameStores,
    /// Counts store
    Counts,
    /// Label scan store
    LabelScanStore,
    /// Relationship type scan store
    RelationshipTypeScanStore,
    /// Schema indexes
    Indexes,
}

impl Stage {
    /// Every stage, in execution order
    pub const ALL: [Stage; 16] = [
        Self::NodeStore,
        Self::NeoStore,
        Self::RelationshipStore,
        Self::NodeRelationshipCache,
        Self::RelationshipGroupStore,
        Self::PropertyStore,
        Self::StringStore,
        Self::ArrayStore,
        Self::NodeDynamicLabelStore,
        Self::SchemaStore,
        Self::TokenStores,
        Self::TokenNameStores,
        Self::Counts,
        Self::LabelScanStore,
        Self::RelationshipTypeScanStore,
        Self::Indexes,
    ];

    /// Name used in logs and progress
    pub fn name(self) -> &'static str {
        match self {
            Self::NodeStore => "NodeStore",
            Self::NeoStore => "NeoStore",
            Self::RelationshipStore => "RelationshipStore",
            Self::NodeRelationshipCache => "NodeRelationshipCache",
            Self::RelationshipGroupStore => "RelationshipGroupStore",
            Self::PropertyStore => "PropertyStore",
            Self::StringStore => "StringStore",
            Self::ArrayStore => "ArrayStore",
            Self::NodeDynamicLabelStore => "NodeDynamicLabelStore",
            Self::SchemaStore => "SchemaStore",
            Self::TokenStores => "TokenStores",
            Self::TokenNameStores => "TokenNameStores",
            Self::Counts => "Counts",
            Self::LabelScanStore => "LabelScanStore",
            Self::RelationshipTypeScanStore => "RelationshipTypeScanStore",
            Self::Indexes => "Indexes",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a scan is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Always on the calling thread, in id order
    SequentialForward,
    /// On the worker pool unless the store is small or only one thread is configured
    Parallel,
}

/// Runs a full consistency check
pub struct FullCheck {
    config: CheckConfig,
    progress: Arc<dyn ProgressMonitorFactory>,
    cache_stats: Arc<dyn CacheStatsSink>,
    hooks: Vec<Arc<dyn RecordCheckHook>>,
    stop: StopControl,
}

impl FullCheck {
    /// Check with logging progress and logging cache statistics
    pub fn new(config: CheckConfig) -> Self {
        Self {
            config,
            progress: Arc::new(LoggingProgress),
            cache_stats: Arc::new(LoggingCacheStats),
            hooks: Vec::new(),
            stop: StopControl::new(),
        }
    }

    /// Replace the progress sink
    pub fn with_progress(mut self, progress: Arc<dyn ProgressMonitorFactory>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the cache statistics sink
    pub fn with_cache_stats(mut self, cache_stats: Arc<dyn CacheStatsSink>) -> Self {
        self.cache_stats = cache_stats;
        self
    }

    /// Observe every record checked
    pub fn with_hook(mut self, hook: Arc<dyn RecordCheckHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Handle that stops the run from any thread
    pub fn stop_control(&self) -> StopControl {
        self.stop.clone()
    }

    /// Check `stores`, reporting every inconsistency to `sink`
    ///
    /// Inconsistencies are data: a store full of them still returns `Ok`.
    /// An engine failure or a stop request returns [`Error::Aborted`] with
    /// the summary of everything reported before it.
    pub fn execute(
        &self,
        stores: Arc<crate::store::StoreAccess>,
        sink: Arc<dyn InconsistencySink>,
    ) -> Result<ConsistencySummaryStatistics> {
        self.config.validate()?;
        let started = Instant::now();
        let summary = Arc::new(ConsistencySummaryStatistics::new());

        let report_file = match &self.config.report_path {
            Some(path) if path.is_dir() => Some(Arc::new(ReportFileSink::create_in(path)?)),
            Some(path) => Some(Arc::new(ReportFileSink::create(path)?)),
            None => None,
        };
        let sink: Arc<dyn InconsistencySink> = match &report_file {
            Some(file) => Arc::new(FanOutSink::new(vec![sink, file.clone()])),
            None => sink,
        };
        let reporter = ConsistencyReporter::new(summary.clone(), sink);
        let ctx = Arc::new(CheckContext::new(
            stores,
            reporter,
            self.config.flags.clone(),
            self.hooks.clone(),
            self.stop.clone(),
        )?);

        info!(
            "Starting consistency check with {} threads ({} node cells)",
            self.config.threads,
            ctx.cache.len()
        );
        let outcome = self.run_stages(&ctx).and_then(|()| ctx.reporter.flush());
        let outcome = match (outcome, &report_file) {
            (Ok(()), Some(file)) => file.write_summary(&summary),
            (outcome, _) => outcome,
        };
        match outcome {
            Ok(()) => {
                info!(
                    "Consistency check finished in {:?}: {} errors, {} warnings",
                    started.elapsed(),
                    summary.total_errors(),
                    summary.total_warnings()
                );
                Ok((*summary).clone())
            }
            Err(cause) => {
                if let Err(e) = ctx.reporter.flush() {
                    error!("Failed to flush inconsistency sink: {}", e);
                }
                error!(
                    "Consistency check aborted after {:?}: {}",
                    started.elapsed(),
                    cause
                );
                Err(Error::Aborted {
                    cause: Box::new(cause),
                    partial: Box::new((*summary).clone()),
                })
            }
        }
    }

    fn run_stages(&self, ctx: &Arc<CheckContext>) -> Result<()> {
        let flags = &self.config.flags;
        let stores = ctx.stores.clone();

        if flags.check_graph {
            let nodes = stores.nodes.high_id();
            self.run_stage(
                ctx,
                Stage::NodeStore,
                Arc::new(NodeChecker::new()),
                ScanPolicy::Parallel,
                nodes,
                || stores.nodes.scan(),
                || self.round_robin(),
            )?;
            let meta_data = stores.meta_data.clone();
            self.run_stage(
                ctx,
                Stage::NeoStore,
                Arc::new(MetaDataChecker),
                ScanPolicy::SequentialForward,
                1,
                || single(meta_data.clone()),
                || self.round_robin(),
            )?;
            self.run_stage(
                ctx,
                Stage::RelationshipStore,
                Arc::new(RelationshipChecker::new(ctx)),
                ScanPolicy::Parallel,
                stores.relationships.high_id(),
                || stores.relationships.scan(),
                || self.relationship_distributor(nodes),
            )?;
            self.run_sweep(ctx, Stage::NodeRelationshipCache, check_node_relationship_cache)?;
            self.run_stage(
                ctx,
                Stage::RelationshipGroupStore,
                Arc::new(RelationshipGroupChecker::new(ctx)),
                ScanPolicy::Parallel,
                stores.relationship_groups.high_id(),
                || stores.relationship_groups.scan(),
                || self.round_robin(),
            )?;
            self.run_stage(
                ctx,
                Stage::PropertyStore,
                Arc::new(PropertyChecker::new(ctx)),
                ScanPolicy::Parallel,
                stores.properties.high_id(),
                || stores.properties.scan(),
                || self.round_robin(),
            )?;
            for (stage, kind) in [
                (Stage::StringStore, DynamicStoreKind::Strings),
                (Stage::ArrayStore, DynamicStoreKind::Arrays),
                (Stage::NodeDynamicLabelStore, DynamicStoreKind::NodeLabels),
            ] {
                self.run_dynamic_stage(ctx, stage, kind)?;
            }
            self.run_stage(
                ctx,
                Stage::SchemaStore,
                Arc::new(SchemaChecker::new()),
                ScanPolicy::SequentialForward,
                stores.schema.high_id(),
                || stores.schema.scan(),
                || self.round_robin(),
            )?;
            for kind in TokenKind::ALL {
                let tokens = stores.tokens(kind);
                self.run_stage(
                    ctx,
                    Stage::TokenStores,
                    Arc::new(TokenChecker::new(kind)),
                    ScanPolicy::Parallel,
                    tokens.high_id(),
                    || tokens.scan(),
                    || self.round_robin(),
                )?;
            }
            for kind in TokenKind::ALL {
                self.run_dynamic_stage(ctx, Stage::TokenNameStores, kind.name_store())?;
            }
            if flags.check_counts {
                self.run_sweep(ctx, Stage::Counts, check_counts)?;
            }
        }

        if flags.check_label_scan_store {
            let scans = [
                (
                    Stage::LabelScanStore,
                    ScanEntity::Nodes,
                    stores.label_scan.clone(),
                ),
                (
                    Stage::RelationshipTypeScanStore,
                    ScanEntity::Relationships,
                    stores.relationship_type_scan.clone(),
                ),
            ];
            for (stage, entity, reader) in scans {
                match reader {
                    Some(reader) => self.run_scan_store_stage(ctx, stage, entity, reader)?,
                    None => debug!("{}: no scan store, skipped", stage),
                }
            }
        }

        if flags.check_indexes {
            self.run_index_stage(ctx)?;
        }
        Ok(())
    }

    fn run_dynamic_stage(
        &self,
        ctx: &Arc<CheckContext>,
        stage: Stage,
        kind: DynamicStoreKind,
    ) -> Result<()> {
        let store = ctx.stores.dynamic(kind).clone();
        self.run_stage(
            ctx,
            stage,
            Arc::new(DynamicChecker::new(kind, ctx)),
            ScanPolicy::Parallel,
            store.high_id(),
            || store.scan(),
            || self.round_robin(),
        )
    }

    fn run_scan_store_stage(
        &self,
        ctx: &Arc<CheckContext>,
        stage: Stage,
        entity: ScanEntity,
        reader: Arc<dyn TokenScanReader>,
    ) -> Result<()> {
        let high_id = entity.high_id(ctx);
        self.run_stage(
            ctx,
            stage,
            Arc::new(TokenScanChecker::new(entity)),
            ScanPolicy::Parallel,
            high_id,
            || GapFreeAllEntriesTokenScanReader::new(reader.all_entries(), high_id).into_bounded(),
            || self.round_robin(),
        )
    }

    fn run_index_stage(&self, ctx: &Arc<CheckContext>) -> Result<()> {
        let online: Vec<(IndexDescriptor, Arc<dyn IndexAccessor>)> = ctx
            .stores
            .indexes
            .iter()
            .filter(|(descriptor, _)| {
                let online = descriptor.state == IndexState::Online;
                if !online {
                    debug!("index {} is {:?}, skipped", descriptor.id, descriptor.state);
                }
                online
            })
            .cloned()
            .collect();
        if online.is_empty() {
            return Ok(());
        }
        for (descriptor, accessor) in &online {
            let entries: Vec<IndexEntry> = accessor
                .entries()
                .into_iter()
                .map(|(node, value)| IndexEntry {
                    index: descriptor.id,
                    node,
                    value,
                })
                .collect();
            let count = entries.len() as u64;
            self.run_stage(
                ctx,
                Stage::Indexes,
                Arc::new(IndexEntryChecker::new(descriptor.clone())),
                ScanPolicy::SequentialForward,
                count,
                || BoundedIterable::new(entries.clone().into_iter().map(Ok), count),
                || self.round_robin(),
            )?;
        }
        let nodes = ctx.stores.nodes.clone();
        self.run_stage(
            ctx,
            Stage::Indexes,
            Arc::new(IndexNodeChecker::new(online)),
            ScanPolicy::Parallel,
            nodes.high_id(),
            || nodes.scan(),
            || self.round_robin(),
        )
    }

    /// One scan per planned pass, then the checker's completion
    fn run_stage<'s, C, F, D>(
        &self,
        ctx: &Arc<CheckContext>,
        stage: Stage,
        checker: Arc<C>,
        policy: ScanPolicy,
        high_id: u64,
        records: F,
        distributor: D,
    ) -> Result<()>
    where
        C: RecordChecker,
        F: Fn() -> BoundedIterable<'s, C::Record>,
        D: Fn() -> Box<dyn QueueDistributor<C::Record>>,
    {
        let started = Instant::now();
        let sequential = policy == ScanPolicy::SequentialForward
            || self.config.threads <= 1
            || high_id < self.config.sequential_threshold;
        info!(
            "{} started ({}, {} ids)",
            stage,
            if sequential { "sequential" } else { "parallel" },
            high_id
        );

        for plan in plan_passes(checker.partitions(), self.config.multi_pass) {
            self.check_stopped()?;
            let access = Arc::new(FilteringRecordAccess::new(ctx.direct_access(), plan));
            checker.pass_started(access.as_ref());
            let processor: Arc<dyn RecordProcessor<C::Record>> = Arc::new(
                CheckingProcessor::new(stage, ctx.clone(), checker.clone(), access),
            );
            let name = format!("{} {}", stage, plan.label());
            debug!("{}: pass started", name);
            if sequential {
                SequentialRecordScanner::new(&name, records(), processor, self.stop.clone())
                    .run(self.progress.as_ref())?;
            } else {
                ParallelRecordScanner::new(
                    &name,
                    records(),
                    processor,
                    distributor(),
                    self.worker_settings(),
                    self.stop.clone(),
                )
                .run(self.progress.as_ref())?;
            }
            self.check_stopped()?;
            checker.check_deferred(ctx)?;
            debug!("{}: pass finished", name);
        }
        checker.complete(ctx)?;
        self.check_stopped()?;
        self.report_cache_stats(ctx, stage, checker.deferred_stats());
        info!("{} finished in {:?}", stage, started.elapsed());
        Ok(())
    }

    /// A stage that sweeps state gathered by earlier stages instead of scanning a store
    fn run_sweep(
        &self,
        ctx: &Arc<CheckContext>,
        stage: Stage,
        sweep: fn(&CheckContext) -> Result<()>,
    ) -> Result<()> {
        self.check_stopped()?;
        let started = Instant::now();
        info!("{} started", stage);
        sweep(ctx)?;
        self.check_stopped()?;
        self.report_cache_stats(ctx, stage, DeferredStats::default());
        info!("{} finished in {:?}", stage, started.elapsed());
        Ok(())
    }

    fn check_stopped(&self) -> Result<()> {
        if self.stop.is_stopped() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn report_cache_stats(&self, ctx: &CheckContext, stage: Stage, stats: DeferredStats) {
        self.cache_stats.report(&CacheStatistics {
            stage: stage.name().to_string(),
            node_cells: ctx.cache.len(),
            deferred_registered: stats.registered,
            resolved_on_arrival: stats.resolved_on_arrival,
            resolved_directly: stats.resolved_directly,
            dangling: stats.dangling,
        });
    }

    fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            threads: self.config.threads,
            queue_capacity: self.config.queue_capacity,
            poll: self.config.poll_interval(),
            drop_dead: self.config.drop_dead_timeout(),
        }
    }

    fn round_robin<R: 'static>(&self) -> Box<dyn QueueDistributor<R>> {
        Box::new(RoundRobinQueueDistributor::new(
            self.config.threads,
            self.config.records_per_queue,
        ))
    }

    fn relationship_distributor(
        &self,
        node_high_id: u64,
    ) -> Box<dyn QueueDistributor<RelationshipRecord>> {
        match self.config.relationship_distribution {
            Distribution::Relationships => Box::new(RelationshipNodesQueueDistributor::new(
                self.config.threads,
                node_high_id,
            )),
            Distribution::RoundRobin => self.round_robin(),
        }
    }
}

fn single<'a>(record: MetaDataRecord) -> BoundedIterable<'a, MetaDataRecord> {
    BoundedIterable::new(std::iter::once(Ok(record)), 1)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use parking_lot::Mutex;

    use super::*;
    use crate::report::{InconsistencyKind, MemorySink, RecordType};
    use crate::store::{RecordStore, Value};
    use crate::testing::GraphStoreFixture;

    #[derive(Default)]
    struct StageRecorder {
        stages: Mutex<Vec<Stage>>,
    }

    impl RecordCheckHook for StageRecorder {
        fn before(&self, stage: Stage, _record_type: RecordType, _id: u64) {
            let mut stages = self.stages.lock();
            if stages.last() != Some(&stage) {
                stages.push(stage);
            }
        }
    }

    #[derive(Default)]
    struct StatsRecorder {
        stats: Mutex<Vec<CacheStatistics>>,
    }

    impl CacheStatsSink for StatsRecorder {
        fn report(&self, stats: &CacheStatistics) {
            self.stats.lock().push(stats.clone());
        }
    }

    fn populated() -> GraphStoreFixture {
        let mut fixture = GraphStoreFixture::new();
        let person = fixture.label("Person");
        let name = fixture.property_key("name");
        let knows = fixture.relationship_type("KNOWS");
        fixture.index(person, name, false);
        let version = fixture.property_key("version");
        fixture.graph_property(version, Value::Int(1));
        let a = fixture.node(&[person], &[(name, Value::String("Ada".into()))]);
        let b = fixture.node(&[person], &[(name, Value::String("Bob".into()))]);
        let hub = fixture.dense_node(&[]);
        fixture.relationship(a, b, knows);
        fixture.relationship(b, hub, knows);
        fixture.relationship(hub, hub, knows);
        fixture
    }

    fn config(threads: usize) -> CheckConfig {
        CheckConfig {
            sequential_threshold: 0,
            ..CheckConfig::with_threads(threads)
        }
    }

    #[test]
    fn test_consistent_store_reports_nothing() {
        let fixture = populated();
        for threads in [1, 3] {
            let sink = Arc::new(MemorySink::new());
            let summary = FullCheck::new(config(threads))
                .execute(Arc::new(fixture.store_access()), sink.clone())
                .unwrap();
            assert!(summary.is_consistent(), "{}\n{:?}", summary, sink.inconsistencies());
            assert!(sink.is_empty());
        }
    }

    #[test]
    fn test_stages_run_in_order() {
        let fixture = populated();
        let recorder = Arc::new(StageRecorder::default());
        FullCheck::new(config(2))
            .with_hook(recorder.clone())
            .execute(Arc::new(fixture.store_access()), Arc::new(MemorySink::new()))
            .unwrap();
        let stages = recorder.stages.lock().clone();
        let positions: Vec<usize> = stages
            .iter()
            .map(|s| Stage::ALL.iter().position(|x| x == s).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", stages);
        assert_eq!(stages.first(), Some(&Stage::NodeStore));
        assert_eq!(stages.last(), Some(&Stage::Indexes));
    }

    #[test]
    fn test_cache_statistics_after_every_stage() {
        let fixture = populated();
        let stats = Arc::new(StatsRecorder::default());
        FullCheck::new(config(2))
            .with_cache_stats(stats.clone())
            .execute(Arc::new(fixture.store_access()), Arc::new(MemorySink::new()))
            .unwrap();
        let stats = stats.stats.lock();
        let stages: Vec<&str> = stats.iter().map(|s| s.stage.as_str()).collect();
        assert!(stages.contains(&"NodeRelationshipCache"));
        assert!(stages.contains(&"Counts"));
        assert!(stats.iter().all(|s| s.node_cells == 3 && s.dangling == 0), "{:?}", stats);
    }

    #[test]
    fn test_flags_skip_stages() {
        let fixture = populated();
        fixture.counts.set(crate::store::CountsKey::node(None), 99);
        let mut cfg = config(1);
        cfg.flags.check_counts = false;
        let summary = FullCheck::new(cfg)
            .execute(Arc::new(fixture.store_access()), Arc::new(MemorySink::new()))
            .unwrap();
        assert!(summary.is_consistent());

        let mut cfg = config(1);
        cfg.flags.check_graph = false;
        let recorder = Arc::new(StageRecorder::default());
        FullCheck::new(cfg)
            .with_hook(recorder.clone())
            .execute(Arc::new(fixture.store_access()), Arc::new(MemorySink::new()))
            .unwrap();
        let stages = recorder.stages.lock().clone();
        assert_eq!(
            stages,
            vec![
                Stage::LabelScanStore,
                Stage::RelationshipTypeScanStore,
                Stage::Indexes
            ]
        );
    }

    #[test]
    fn test_stop_before_run_aborts_with_cancelled() {
        let fixture = populated();
        let check = FullCheck::new(config(2));
        check.stop_control().stop();
        let err = check
            .execute(Arc::new(fixture.store_access()), Arc::new(MemorySink::new()))
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.partial_summary().is_some());
    }

    struct StopOnRelationship {
        stop: StopControl,
    }

    impl RecordCheckHook for StopOnRelationship {
        fn before(&self, stage: Stage, _record_type: RecordType, _id: u64) {
            if stage == Stage::RelationshipStore {
                self.stop.stop();
            }
        }
    }

    #[test]
    fn test_stop_mid_run_keeps_partial_summary() {
        let fixture = populated();
        fixture.nodes.update(0, |n| n.labels = crate::store::NodeLabels::Inline(vec![77]));
        let check = FullCheck::new(config(1));
        let stop = check.stop_control();
        let check = check.with_hook(Arc::new(StopOnRelationship { stop }));
        let err = check
            .execute(Arc::new(fixture.store_access()), Arc::new(MemorySink::new()))
            .unwrap_err();
        assert!(err.is_cancelled());
        let partial = err.partial_summary().unwrap();
        assert_eq!(partial.inconsistency_count_for_record_type(RecordType::Node), 1);
    }

    #[test]
    fn test_report_file_receives_lines_and_summary() {
        let fixture = populated();
        let node = fixture.nodes.get(0).unwrap();
        fixture.nodes.update(node.id, |n| n.next_prop = 1_000);
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("check.report");
        let mut cfg = config(1);
        cfg.report_path = Some(path.clone());
        let summary = FullCheck::new(cfg)
            .execute(Arc::new(fixture.store_access()), Arc::new(MemorySink::new()))
            .unwrap();
        assert!(!summary.is_consistent());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len() as u64, summary.total_inconsistency_count() + 1);
        assert!(lines.last().unwrap().starts_with('{'));
        let expected = InconsistencyKind::PropertyNotInUse { property: 1_000 };
        assert!(lines[0].contains(&expected.to_string()), "{}", lines[0]);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_scanning() {
        let fixture = populated();
        let err = FullCheck::new(CheckConfig::with_threads(0))
            .execute(Arc::new(fixture.store_access()), Arc::new(MemorySink::new()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
