//! Relationship group records

use std::sync::Arc;

use super::multi_pass::MultiPassStore;
use super::reference::{DeferredReferences, DeferredStats};
use super::{CheckContext, CheckScope, RecordAccess, RecordChecker};
use crate::error::Result;
use crate::report::{InconsistencyKind as K, RecordType};
use crate::store::{GroupDirection, NO_TOKEN, NULL_REFERENCE, RelationshipGroupRecord, TokenKind};

/// Checks relationship group records
pub struct RelationshipGroupChecker {
    next_groups: Arc<DeferredReferences<RelationshipGroupRecord>>,
}

impl RelationshipGroupChecker {
    /// Checker over `ctx`'s group store
    pub fn new(ctx: &CheckContext) -> Self {
        Self {
            next_groups: Arc::new(DeferredReferences::new(
                "relationship group chain",
                ctx.stores.relationship_groups.clone(),
                None,
            )),
        }
    }

    fn check_local(&self, group: &RelationshipGroupRecord, scope: &CheckScope<'_>) -> Result<()> {
        let ctx = scope.ctx;
        if group.rel_type == NO_TOKEN {
            ctx.report(RecordType::RelationshipGroup, group.id, K::IllegalRelationshipType);
        } else if !ctx.tokens.in_use(TokenKind::RelationshipType, group.rel_type) {
            ctx.report(
                RecordType::RelationshipGroup,
                group.id,
                K::RelationshipTypeNotInUse {
                    rel_type: group.rel_type,
                },
            );
        }
        if group.owning_node == NULL_REFERENCE {
            ctx.report(RecordType::RelationshipGroup, group.id, K::IllegalOwner);
        }

        let next = group.next;
        if next == NULL_REFERENCE {
            return Ok(());
        }
        let id = group.id;
        let owner = group.owning_node;
        let rel_type = group.rel_type;
        self.next_groups
            .reference(scope.access, next)
            .dispatch(ctx, move |target, ctx| {
                if !target.in_use {
                    ctx.report(RecordType::RelationshipGroup, id, K::NextGroupNotInUse { next });
                    return;
                }
                if target.owning_node != owner {
                    ctx.report(
                        RecordType::RelationshipGroup,
                        id,
                        K::NextGroupHasOtherOwner {
                            next,
                            owner: target.owning_node,
                        },
                    );
                }
                if target.rel_type <= rel_type {
                    ctx.report(RecordType::RelationshipGroup, id, K::InvalidTypeSortOrder { next });
                }
            })
    }

    fn check_owner(&self, group: &RelationshipGroupRecord, scope: &CheckScope<'_>) -> Result<()> {
        let owner = group.owning_node;
        if owner == NULL_REFERENCE {
            return Ok(());
        }
        let id = group.id;
        scope.access.node(owner)?.dispatch(scope.ctx, move |node, ctx| {
            if !node.in_use {
                ctx.report(RecordType::RelationshipGroup, id, K::OwnerNotInUse { owner });
            }
        })
    }

    fn check_chain_heads(
        &self,
        group: &RelationshipGroupRecord,
        scope: &CheckScope<'_>,
    ) -> Result<()> {
        for direction in GroupDirection::ALL {
            let relationship = group.first(direction);
            if relationship == NULL_REFERENCE {
                continue;
            }
            let id = group.id;
            let owner = group.owning_node;
            let rel_type = group.rel_type;
            scope
                .access
                .relationship(relationship)?
                .dispatch(scope.ctx, move |rel, ctx| {
                    if !rel.in_use {
                        ctx.report(
                            RecordType::RelationshipGroup,
                            id,
                            K::FirstRelationshipNotInUse {
                                direction,
                                relationship,
                            },
                        );
                        return;
                    }
                    if rel.rel_type != rel_type {
                        ctx.report(
                            RecordType::RelationshipGroup,
                            id,
                            K::FirstRelationshipOfOtherType {
                                direction,
                                relationship,
                            },
                        );
                    }
                    let heads_owner_chain = GroupDirection::of(rel, owner) == Some(direction)
                        && rel.first_in_chain(direction.side());
                    if !heads_owner_chain {
                        ctx.report(
                            RecordType::RelationshipGroup,
                            id,
                            K::FirstRelationshipNotFirstInChain {
                                direction,
                                relationship,
                            },
                        );
                    }
                })?;
        }
        Ok(())
    }
}

impl RecordChecker for RelationshipGroupChecker {
    type Record = RelationshipGroupRecord;

    fn record_type(&self) -> RecordType {
        RecordType::RelationshipGroup
    }

    fn partitions(&self) -> &'static [MultiPassStore] {
        &[MultiPassStore::Nodes, MultiPassStore::Relationships]
    }

    fn pass_started(&self, access: &dyn RecordAccess) {
        self.next_groups.begin_pass(access);
    }

    fn check(&self, group: &RelationshipGroupRecord, scope: &CheckScope<'_>) -> Result<()> {
        if scope.first_pass() {
            self.check_local(group, scope)?;
            self.next_groups.arrive(group, scope.ctx);
        }
        if scope.checks(MultiPassStore::Nodes) {
            self.check_owner(group, scope)?;
        }
        if scope.checks(MultiPassStore::Relationships) {
            self.check_chain_heads(group, scope)?;
        }
        Ok(())
    }

    fn check_deferred(&self, ctx: &CheckContext) -> Result<()> {
        self.next_groups.finish(ctx)
    }

    fn deferred_stats(&self) -> DeferredStats {
        self.next_groups.take_stats()
    }
}
