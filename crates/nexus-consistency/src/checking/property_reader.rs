//! Property chain and value reading
//!
//! Every walk carries a visited set, so a chain wired into a cycle ends with
//! [`PropertyChainError::Circular`] naming the record that closes it instead
//! of looping.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::Error;
use crate::store::{
    DynamicRecord, NULL_REFERENCE, PropertyBlock, PropertyRecord, PropertyType, RecordStore,
    StoreAccess, Value, decode_array, decode_short_string,
};

/// Why a property chain could not be read to its end
#[derive(Error, Debug)]
pub enum PropertyChainError {
    /// Following `next` revisited a record
    #[error("Circular property record chain closed by record {record}")]
    Circular {
        /// Record whose `next` points back into the chain
        record: u64,
    },

    /// Store failure
    #[error(transparent)]
    Store(#[from] Error),
}

/// Reads property chains and decodes values
pub struct PropertyReader<'a> {
    stores: &'a StoreAccess,
}

impl<'a> PropertyReader<'a> {
    /// Reader over `stores`
    pub fn new(stores: &'a StoreAccess) -> Self {
        Self { stores }
    }

    /// Records of the chain starting at `first`, in chain order. Stops
    /// before the first record that is not in use.
    pub fn property_record_chain(
        &self,
        first: u64,
    ) -> std::result::Result<Vec<PropertyRecord>, PropertyChainError> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut next = first;
        let mut previous = NULL_REFERENCE;
        while next != NULL_REFERENCE {
            if !visited.insert(next) {
                return Err(PropertyChainError::Circular { record: previous });
            }
            let record = self.stores.properties.get(next)?;
            if !record.in_use {
                break;
            }
            previous = next;
            next = record.next_prop;
            chain.push(record);
        }
        Ok(chain)
    }

    /// Decoded value of one block; `None` when the block cannot be decoded
    pub fn value(&self, block: &PropertyBlock) -> crate::Result<Option<Value>> {
        let Some(property_type) = block.property_type() else {
            return Ok(None);
        };
        Ok(match property_type {
            PropertyType::Bool => Some(Value::Bool(block.value != 0)),
            PropertyType::Int => Some(Value::Int(block.value as i64)),
            PropertyType::Float => Some(Value::Float(block.value)),
            PropertyType::ShortString => decode_short_string(block.value).map(Value::String),
            PropertyType::String => read_dynamic_chain(self.stores.strings.as_ref(), block.value)?
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .map(Value::String),
            PropertyType::Array => read_dynamic_chain(self.stores.arrays.as_ref(), block.value)?
                .and_then(|bytes| decode_array(&bytes))
                .map(Value::Bytes),
        })
    }

    /// Value of `key` in the chain starting at `first`. A broken or
    /// circular chain yields the value only if it was seen before the break.
    pub fn chain_value(&self, first: u64, key: u32) -> crate::Result<Option<Value>> {
        let chain = match self.property_record_chain(first) {
            Ok(chain) => chain,
            Err(PropertyChainError::Circular { .. }) => return Ok(None),
            Err(PropertyChainError::Store(e)) => return Err(e),
        };
        for record in &chain {
            if let Some(block) = record.blocks.iter().find(|b| b.key == key) {
                return self.value(block);
            }
        }
        Ok(None)
    }
}

/// Concatenated payload of a dynamic chain; `None` when a block is missing,
/// not in use, or the chain loops
pub fn read_dynamic_chain(
    store: &dyn RecordStore<DynamicRecord>,
    first: u64,
) -> crate::Result<Option<Vec<u8>>> {
    let mut payload = Vec::new();
    let mut visited = HashSet::new();
    let mut next = first;
    while next != NULL_REFERENCE {
        if !visited.insert(next) {
            return Ok(None);
        }
        let block = store.get(next)?;
        if !block.in_use {
            return Ok(None);
        }
        payload.extend_from_slice(&block.data);
        next = block.next;
    }
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GraphStoreFixture;

    #[test]
    fn test_reads_chain_in_order() {
        let mut fixture = GraphStoreFixture::new();
        let keys: Vec<u32> = (0..9).map(|i| fixture.property_key(&format!("k{}", i))).collect();
        let props: Vec<(u32, Value)> = keys.iter().map(|k| (*k, Value::Int(*k as i64))).collect();
        let node = fixture.node(&[], &props);
        let first = fixture.nodes.get(node).unwrap().next_prop;

        let stores = fixture.store_access();
        let reader = PropertyReader::new(&stores);
        let chain = reader.property_record_chain(first).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].id, first);
        let seen: usize = chain.iter().map(|r| r.blocks.len()).sum();
        assert_eq!(seen, 9);
        assert_eq!(reader.chain_value(first, keys[8]).unwrap(), Some(Value::Int(keys[8] as i64)));
    }

    #[test]
    fn test_decodes_dynamic_values() {
        let mut fixture = GraphStoreFixture::new();
        let name = fixture.property_key("name");
        let blob = fixture.property_key("blob");
        let long = "a string that is much longer than one block ".repeat(5);
        let node = fixture.node(
            &[],
            &[
                (name, Value::String(long.clone())),
                (blob, Value::Bytes(vec![7; 300])),
            ],
        );
        let first = fixture.nodes.get(node).unwrap().next_prop;
        let stores = fixture.store_access();
        let reader = PropertyReader::new(&stores);
        assert_eq!(reader.chain_value(first, name).unwrap(), Some(Value::String(long)));
        assert_eq!(reader.chain_value(first, blob).unwrap(), Some(Value::Bytes(vec![7; 300])));
    }

    #[test]
    fn test_chain_of_unused_record_is_empty() {
        let fixture = GraphStoreFixture::new();
        let stores = fixture.store_access();
        let reader = PropertyReader::new(&stores);
        assert!(reader.property_record_chain(42).unwrap().is_empty());
        assert!(reader.property_record_chain(NULL_REFERENCE).unwrap().is_empty());
    }
}
