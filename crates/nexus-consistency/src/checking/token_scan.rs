//! Label and relationship type scan stores against the entity stores
//!
//! Ranges come from a gap-free reader, so every entity below the high id is
//! visited exactly once whether or not the scan store holds entries for it.
//! Entries for entities at or past the high id are visited too; those ids
//! read as not in use.

use super::labels::NodeLabelReader;
use super::{CheckContext, CheckScope, RecordChecker};
use crate::error::Result;
use crate::report::{InconsistencyKind as K, RecordType};
use crate::store::{EntityTokenRange, NO_TOKEN};

/// Entities a scan store indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEntity {
    /// Label scan store over nodes
    Nodes,
    /// Relationship type scan store over relationships
    Relationships,
}

impl ScanEntity {
    fn document_type(self) -> RecordType {
        match self {
            Self::Nodes => RecordType::LabelScanDocument,
            Self::Relationships => RecordType::RelationshipTypeScanDocument,
        }
    }

    fn entity_type(self) -> RecordType {
        match self {
            Self::Nodes => RecordType::Node,
            Self::Relationships => RecordType::Relationship,
        }
    }

    /// One past the highest entity id
    pub fn high_id(self, ctx: &CheckContext) -> u64 {
        match self {
            Self::Nodes => ctx.stores.nodes.high_id(),
            Self::Relationships => ctx.stores.relationships.high_id(),
        }
    }

    /// Tokens the entity store holds for `entity`, `None` when not in use
    fn tokens_of(self, entity: u64, ctx: &CheckContext) -> Result<Option<Vec<u32>>> {
        match self {
            Self::Nodes => {
                let node = ctx.stores.nodes.get(entity)?;
                if !node.in_use {
                    return Ok(None);
                }
                NodeLabelReader::new(&ctx.stores).labels(&node).map(Some)
            }
            Self::Relationships => {
                let rel = ctx.stores.relationships.get(entity)?;
                if !rel.in_use {
                    return Ok(None);
                }
                Ok(Some(if rel.rel_type == NO_TOKEN {
                    Vec::new()
                } else {
                    vec![rel.rel_type]
                }))
            }
        }
    }
}

/// Checks one scan store range by range
#[derive(Debug, Clone, Copy)]
pub struct TokenScanChecker {
    entity: ScanEntity,
}

impl TokenScanChecker {
    /// Checker for the scan store over `entity`
    pub fn new(entity: ScanEntity) -> Self {
        Self { entity }
    }
}

impl RecordChecker for TokenScanChecker {
    type Record = EntityTokenRange;

    fn record_type(&self) -> RecordType {
        self.entity.document_type()
    }

    fn check(&self, range: &EntityTokenRange, scope: &CheckScope<'_>) -> Result<()> {
        let ctx = scope.ctx;
        let document = self.entity.document_type();
        let high_id = self.entity.high_id(ctx);
        for entity in range.entities() {
            let indexed = range.tokens(entity);
            if entity >= high_id && indexed.is_empty() {
                continue;
            }
            let Some(actual) = self.entity.tokens_of(entity, ctx)? else {
                if !indexed.is_empty() {
                    ctx.report(document, range.id(), K::EntityNotInUse { entity });
                }
                continue;
            };
            for &token in indexed {
                if !actual.contains(&token) {
                    ctx.report(
                        document,
                        range.id(),
                        K::EntityDoesNotHaveExpectedToken { entity, token },
                    );
                }
            }
            for &token in &actual {
                if !indexed.contains(&token) {
                    ctx.report(
                        self.entity.entity_type(),
                        entity,
                        K::TokenNotInScanStore { token },
                    );
                }
            }
        }
        Ok(())
    }
}
