//! The neostore record and the graph property chain it owns

use super::multi_pass::MultiPassStore;
use super::property::check_owner_properties;
use super::{CheckScope, RecordChecker};
use crate::error::Result;
use crate::report::RecordType;
use crate::store::MetaDataRecord;

/// Checks the graph property chain like a node's
#[derive(Debug, Default)]
pub struct MetaDataChecker;

impl RecordChecker for MetaDataChecker {
    type Record = MetaDataRecord;

    fn record_type(&self) -> RecordType {
        RecordType::NeoStore
    }

    fn partitions(&self) -> &'static [MultiPassStore] {
        &[MultiPassStore::Properties]
    }

    fn check(&self, record: &MetaDataRecord, scope: &CheckScope<'_>) -> Result<()> {
        if scope.checks(MultiPassStore::Properties) {
            check_owner_properties(RecordType::NeoStore, 0, record.next_prop, scope)?;
        }
        Ok(())
    }
}
