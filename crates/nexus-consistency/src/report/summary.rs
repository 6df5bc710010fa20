//! Aggregated inconsistency counts

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::{RecordType, Severity};

/// Per record type inconsistency counts, updated lock-free by every worker
#[derive(Debug, Default)]
pub struct ConsistencySummaryStatistics {
    per_type: [AtomicU64; RecordType::COUNT],
    errors: AtomicU64,
    warnings: AtomicU64,
}

impl ConsistencySummaryStatistics {
    /// Empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one inconsistency
    pub fn add(&self, record_type: RecordType, severity: Severity) {
        self.per_type[record_type.index()].fetch_add(1, Ordering::Relaxed);
        match severity {
            Severity::Error => self.errors.fetch_add(1, Ordering::Relaxed),
            Severity::Warning => self.warnings.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Inconsistencies reported against one record type
    pub fn inconsistency_count_for_record_type(&self, record_type: RecordType) -> u64 {
        self.per_type[record_type.index()].load(Ordering::Relaxed)
    }

    /// Inconsistencies across all record types
    pub fn total_inconsistency_count(&self) -> u64 {
        self.per_type
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .sum()
    }

    /// Error-severity inconsistencies
    pub fn total_errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Warning-severity inconsistencies
    pub fn total_warnings(&self) -> u64 {
        self.warnings.load(Ordering::Relaxed)
    }

    /// True iff every per-type count is zero
    pub fn is_consistent(&self) -> bool {
        self.total_inconsistency_count() == 0
    }

    /// Non-zero counts by record type
    pub fn counts(&self) -> BTreeMap<RecordType, u64> {
        RecordType::ALL
            .iter()
            .map(|t| (*t, self.inconsistency_count_for_record_type(*t)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

impl Clone for ConsistencySummaryStatistics {
    fn clone(&self) -> Self {
        let copy = Self::new();
        for (target, source) in copy.per_type.iter().zip(&self.per_type) {
            target.store(source.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        copy.errors.store(self.total_errors(), Ordering::Relaxed);
        copy.warnings.store(self.total_warnings(), Ordering::Relaxed);
        copy
    }
}

impl fmt::Display for ConsistencySummaryStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ConsistencySummaryStatistics{{")?;
        writeln!(f, "    Number of errors: {}", self.total_errors())?;
        writeln!(f, "    Number of warnings: {}", self.total_warnings())?;
        for (record_type, count) in self.counts() {
            writeln!(
                f,
                "    Number of inconsistent {} records: {}",
                record_type, count
            )?;
        }
        write!(f, "}}")
    }
}

impl Serialize for ConsistencySummaryStatistics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ConsistencySummaryStatistics", 4)?;
        state.serialize_field("consistent", &self.is_consistent())?;
        state.serialize_field("errors", &self.total_errors())?;
        state.serialize_field("warnings", &self.total_warnings())?;
        state.serialize_field("inconsistencies", &self.counts())?;
        state.end()
    }
}
