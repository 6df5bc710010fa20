//! Label, property key and relationship type tokens

use super::{CheckScope, RecordChecker};
use crate::error::Result;
use crate::report::{InconsistencyKind as K, RecordType};
use crate::store::{NULL_REFERENCE, TokenKind, TokenRecord};

/// Checks the records of one token store
#[derive(Debug, Clone, Copy)]
pub struct TokenChecker {
    kind: TokenKind,
}

impl TokenChecker {
    /// Checker for `kind` tokens
    pub fn new(kind: TokenKind) -> Self {
        Self { kind }
    }
}

impl RecordChecker for TokenChecker {
    type Record = TokenRecord;

    fn record_type(&self) -> RecordType {
        self.kind.record_type()
    }

    fn check(&self, token: &TokenRecord, scope: &CheckScope<'_>) -> Result<()> {
        let record_type = self.kind.record_type();
        let id = token.id;
        let record = token.name_id;
        if record == NULL_REFERENCE {
            scope.ctx.report(record_type, id, K::EmptyName { record });
            return Ok(());
        }
        let names = self.kind.name_store();
        scope
            .access
            .dynamic(names, record)?
            .dispatch(scope.ctx, move |block, ctx| {
                if !block.in_use {
                    ctx.report(record_type, id, K::NameBlockNotInUse { record });
                    return;
                }
                if block.data.is_empty() {
                    ctx.report(record_type, id, K::EmptyName { record });
                }
                if ctx.flags.check_property_owners && ctx.dynamic_owners(names).mark(record) {
                    ctx.report(record_type, id, K::NameMultipleOwners { record });
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::report::MemorySink;
    use crate::store::{DynamicRecord, Record, RecordStore};
    use crate::testing::{GraphStoreFixture, check_records};

    #[test]
    fn test_token_names() {
        let mut fixture = GraphStoreFixture::new();
        let person = fixture.label("Person") as u64;
        let city = fixture.label("City") as u64;
        let movie = fixture.label("Movie") as u64;
        let shared = fixture.labels.get(person).unwrap().name_id;
        fixture.labels.update(city, |t| t.name_id = shared);
        let dropped = fixture.labels.get(movie).unwrap().name_id;
        fixture.label_names.write(DynamicRecord::unused(dropped));

        let sink = Arc::new(MemorySink::new());
        let ctx = fixture.check_context_with_sink(sink.clone());
        let tokens: Vec<TokenRecord> = ctx.stores.labels.scan().map(|r| r.unwrap()).collect();
        check_records(&TokenChecker::new(TokenKind::Label), &ctx, tokens).unwrap();

        let found = sink.for_record_type(RecordType::Label);
        assert_eq!(found.len(), 2, "{:?}", found);
        assert_eq!(found[0].id, city);
        assert_eq!(found[0].kind, K::NameMultipleOwners { record: shared });
        assert_eq!(found[1].id, movie);
        assert_eq!(found[1].kind, K::NameBlockNotInUse { record: dropped });
    }
}
