//! Inconsistency reporting
//!
//! Checkers never touch the summary or the sinks directly. Every finding is
//! an [`Inconsistency`] handed to [`ConsistencyReporter::report`], which
//! drops exact duplicates (a record reached from two queues or two passes is
//! reported once), counts the rest and forwards them to the sink.

pub mod kind;
pub mod sink;
pub mod summary;

use std::fmt;
use std::sync::Arc;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};

pub use kind::{DynamicValueKind, InconsistencyKind, SchemaObligation};
pub use sink::{FanOutSink, InconsistencySink, MemorySink, ReportFileSink, TracingSink};
pub use summary::ConsistencySummaryStatistics;

/// Kind of record an inconsistency is reported against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    /// Node store
    Node,
    /// Relationship store
    Relationship,
    /// Relationship group store
    RelationshipGroup,
    /// Property store
    Property,
    /// Dynamic string store
    StringProperty,
    /// Dynamic array store
    ArrayProperty,
    /// Schema store
    Schema,
    /// Label tokens
    Label,
    /// Label token names
    LabelName,
    /// Label scan store ranges
    LabelScanDocument,
    /// Relationship type scan store ranges
    RelationshipTypeScanDocument,
    /// Relationship type tokens
    RelationshipType,
    /// Relationship type token names
    RelationshipTypeName,
    /// Property key tokens
    PropertyKey,
    /// Property key token names
    PropertyKeyName,
    /// Schema index entries
    Index,
    /// Counts store
    Counts,
    /// Dynamic node label store
    NodeDynamicLabel,
    /// Neostore metadata record
    NeoStore,
}

impl RecordType {
    /// Number of record types
    pub const COUNT: usize = 19;

    /// Every record type, in summary order
    pub const ALL: [RecordType; Self::COUNT] = [
        Self::Node,
        Self::Relationship,
        Self::RelationshipGroup,
        Self::Property,
        Self::StringProperty,
        Self::ArrayProperty,
        Self::Schema,
        Self::Label,
        Self::LabelName,
        Self::LabelScanDocument,
        Self::RelationshipTypeScanDocument,
        Self::RelationshipType,
        Self::RelationshipTypeName,
        Self::PropertyKey,
        Self::PropertyKeyName,
        Self::Index,
        Self::Counts,
        Self::NodeDynamicLabel,
        Self::NeoStore,
    ];

    /// Position in [`RecordType::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Upper-case name used in reports
    pub fn name(self) -> &'static str {
        match self {
            Self::Node => "NODE",
            Self::Relationship => "RELATIONSHIP",
            Self::RelationshipGroup => "RELATIONSHIP_GROUP",
            Self::Property => "PROPERTY",
            Self::StringProperty => "STRING_PROPERTY",
            Self::ArrayProperty => "ARRAY_PROPERTY",
            Self::Schema => "SCHEMA",
            Self::Label => "LABEL",
            Self::LabelName => "LABEL_NAME",
            Self::LabelScanDocument => "LABEL_SCAN_DOCUMENT",
            Self::RelationshipTypeScanDocument => "RELATIONSHIP_TYPE_SCAN_DOCUMENT",
            Self::RelationshipType => "RELATIONSHIP_TYPE",
            Self::RelationshipTypeName => "RELATIONSHIP_TYPE_NAME",
            Self::PropertyKey => "PROPERTY_KEY",
            Self::PropertyKeyName => "PROPERTY_KEY_NAME",
            Self::Index => "INDEX",
            Self::Counts => "COUNTS",
            Self::NodeDynamicLabel => "NODE_DYNAMIC_LABEL",
            Self::NeoStore => "NEO_STORE",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Severity of an inconsistency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Structural damage
    Error,
    /// Suspicious but readable
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
        }
    }
}

/// One detected inconsistency
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Inconsistency {
    /// Record kind the finding is filed against
    pub record_type: RecordType,
    /// Id of the offending record
    pub id: u64,
    /// What is wrong, with the ids involved
    pub kind: InconsistencyKind,
}

impl Inconsistency {
    /// Create an inconsistency
    pub fn new(record_type: RecordType, id: u64, kind: InconsistencyKind) -> Self {
        Self {
            record_type,
            id,
            kind,
        }
    }

    /// Severity from the kind table
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}[{}] {}",
            self.severity(),
            self.record_type,
            self.id,
            self.kind
        )
    }
}

/// The single path from checkers to the summary and the sink
pub struct ConsistencyReporter {
    summary: Arc<ConsistencySummaryStatistics>,
    sink: Arc<dyn InconsistencySink>,
    seen: DashSet<Inconsistency>,
}

impl ConsistencyReporter {
    /// Reporter feeding a summary and a sink
    pub fn new(
        summary: Arc<ConsistencySummaryStatistics>,
        sink: Arc<dyn InconsistencySink>,
    ) -> Self {
        Self {
            summary,
            sink,
            seen: DashSet::new(),
        }
    }

    /// Report a finding against a record
    pub fn report(&self, record_type: RecordType, id: u64, kind: InconsistencyKind) {
        debug_assert!(
            kind.record_types().contains(&record_type),
            "{:?} reported against {}",
            kind,
            record_type
        );
        let inconsistency = Inconsistency::new(record_type, id, kind);
        if !self.seen.insert(inconsistency.clone()) {
            return;
        }
        self.summary.add(record_type, inconsistency.severity());
        self.sink.log(&inconsistency);
    }

    /// Summary being filled
    pub fn summary(&self) -> &Arc<ConsistencySummaryStatistics> {
        &self.summary
    }

    /// Flush the sink
    pub fn flush(&self) -> crate::Result<()> {
        self.sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter() -> (ConsistencyReporter, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let summary = Arc::new(ConsistencySummaryStatistics::new());
        (ConsistencyReporter::new(summary, sink.clone()), sink)
    }

    #[test]
    fn test_record_type_order_matches_index() {
        for (i, record_type) in RecordType::ALL.iter().enumerate() {
            assert_eq!(record_type.index(), i);
        }
    }

    #[test]
    fn test_duplicates_are_reported_once() {
        let (reporter, sink) = reporter();
        let kind = InconsistencyKind::RelationshipNotInUse { relationship: 9 };
        reporter.report(RecordType::Node, 1, kind.clone());
        reporter.report(RecordType::Node, 1, kind.clone());
        reporter.report(RecordType::Node, 2, kind);

        assert_eq!(sink.len(), 2);
        assert_eq!(
            reporter
                .summary()
                .inconsistency_count_for_record_type(RecordType::Node),
            2
        );
        assert_eq!(reporter.summary().total_errors(), 2);
    }

    #[test]
    fn test_display_line() {
        let line = Inconsistency::new(
            RecordType::StringProperty,
            4,
            InconsistencyKind::EmptyBlock,
        )
        .to_string();
        assert_eq!(line, "WARNING: STRING_PROPERTY[4] The block is empty.");
    }
}
