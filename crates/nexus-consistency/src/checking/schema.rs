//! Schema rules
//!
//! Rules are checked sequentially: duplicate detection keeps the first rule
//! seen for each content and each obligation, and later rules are reported
//! against it.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{CheckContext, CheckScope, RecordChecker};
use crate::error::Result;
use crate::report::{InconsistencyKind as K, RecordType, SchemaObligation};
use crate::store::{SchemaRecord, SchemaRule, SchemaRuleKind, TokenKind};

/// What makes two rules the same rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RuleContent {
    Index {
        label: u32,
        property_keys: Vec<u32>,
        unique: bool,
    },
    Constraint {
        label: u32,
        property_keys: Vec<u32>,
    },
}

impl RuleContent {
    fn of(rule: &SchemaRule) -> Self {
        match rule.kind {
            SchemaRuleKind::Index { unique, .. } => Self::Index {
                label: rule.label,
                property_keys: rule.property_keys.clone(),
                unique,
            },
            SchemaRuleKind::UniquenessConstraint { .. } => Self::Constraint {
                label: rule.label,
                property_keys: rule.property_keys.clone(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct SchemaState {
    contents: HashMap<RuleContent, u64>,
    /// constraint id -> index rule claiming it
    claimed_constraints: HashMap<u64, u64>,
    /// index id -> constraint rule claiming it
    claimed_indexes: HashMap<u64, u64>,
}

/// Checks schema rules and the references between them
#[derive(Debug, Default)]
pub struct SchemaChecker {
    state: Mutex<SchemaState>,
}

impl SchemaChecker {
    /// New checker
    pub fn new() -> Self {
        Self::default()
    }

    fn check_tokens(&self, id: u64, rule: &SchemaRule, ctx: &CheckContext) {
        if !ctx.tokens.in_use(TokenKind::Label, rule.label) {
            ctx.report(RecordType::Schema, id, K::LabelNotInUse { label: rule.label });
        }
        for &key in &rule.property_keys {
            if !ctx.tokens.in_use(TokenKind::PropertyKey, key) {
                ctx.report(RecordType::Schema, id, K::PropertyKeyNotInUse { key });
            }
        }
    }

    fn check_index(
        &self,
        id: u64,
        owning_constraint: Option<u64>,
        scope: &CheckScope<'_>,
    ) -> Result<()> {
        let Some(constraint) = owning_constraint else {
            scope.ctx.report(
                RecordType::Schema,
                id,
                K::MissingObligation {
                    obligation: SchemaObligation::UniquenessConstraint,
                },
            );
            return Ok(());
        };
        let previous = self.state.lock().claimed_constraints.insert(constraint, id);
        if let Some(other) = previous {
            scope
                .ctx
                .report(RecordType::Schema, id, K::DuplicateObligation { other });
            return Ok(());
        }
        scope
            .access
            .schema(constraint)?
            .dispatch(scope.ctx, move |record, ctx| {
                let references_back = record.in_use
                    && matches!(
                        record.rule.as_ref().map(|r| &r.kind),
                        Some(SchemaRuleKind::UniquenessConstraint { owned_index })
                            if *owned_index == id
                    );
                if !references_back {
                    ctx.report(
                        RecordType::Schema,
                        id,
                        K::ConstraintIndexRuleNotReferencingBack { constraint },
                    );
                }
            })
    }

    fn check_constraint(&self, id: u64, owned_index: u64, scope: &CheckScope<'_>) -> Result<()> {
        let previous = self.state.lock().claimed_indexes.insert(owned_index, id);
        if let Some(other) = previous {
            scope
                .ctx
                .report(RecordType::Schema, id, K::DuplicateObligation { other });
            return Ok(());
        }
        scope
            .access
            .schema(owned_index)?
            .dispatch(scope.ctx, move |record, ctx| {
                let owner = match record.rule.as_ref().map(|r| &r.kind) {
                    Some(SchemaRuleKind::Index {
                        owning_constraint, ..
                    }) if record.in_use => *owning_constraint,
                    _ => {
                        ctx.report(
                            RecordType::Schema,
                            id,
                            K::MissingObligation {
                                obligation: SchemaObligation::ConstraintIndexRule,
                            },
                        );
                        return;
                    }
                };
                if owner != Some(id) {
                    ctx.report(
                        RecordType::Schema,
                        id,
                        K::UniquenessConstraintNotReferencingBack { index: owned_index },
                    );
                }
            })
    }
}

impl RecordChecker for SchemaChecker {
    type Record = SchemaRecord;

    fn record_type(&self) -> RecordType {
        RecordType::Schema
    }

    fn check(&self, record: &SchemaRecord, scope: &CheckScope<'_>) -> Result<()> {
        let ctx = scope.ctx;
        let Some(rule) = &record.rule else {
            ctx.report(RecordType::Schema, record.id, K::MalformedSchemaRule);
            return Ok(());
        };
        self.check_tokens(record.id, rule, ctx);

        let previous = *self
            .state
            .lock()
            .contents
            .entry(RuleContent::of(rule))
            .or_insert(record.id);
        if previous != record.id {
            ctx.report(
                RecordType::Schema,
                record.id,
                K::DuplicateRuleContent { other: previous },
            );
        }

        match rule.kind {
            SchemaRuleKind::Index {
                unique: true,
                owning_constraint,
            } => self.check_index(record.id, owning_constraint, scope),
            SchemaRuleKind::Index { unique: false, .. } => Ok(()),
            SchemaRuleKind::UniquenessConstraint { owned_index } => {
                self.check_constraint(record.id, owned_index, scope)
            }
        }
    }
}
