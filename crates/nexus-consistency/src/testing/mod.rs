//! In-memory graph store builder for tests and benchmarks
//!
//! [`GraphStoreFixture`] writes records the way a healthy store lays them
//! out: chain heads carry chain lengths, dense nodes keep per-type groups
//! sorted by type, the counts store and both scan stores follow every
//! write. Tests then corrupt single fields through the public store
//! handles and run checkers against the result.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::checking::{CheckContext, CheckScope, FilteringRecordAccess, PassPlan, RecordChecker};
use crate::config::ConsistencyFlags;
use crate::error::Result;
use crate::report::{ConsistencyReporter, ConsistencySummaryStatistics, MemorySink};
use crate::scan::{QueueScope, StopControl};
use crate::store::{
    ARRAY_BLOCK_SIZE, CountsKey, DynamicRecord, GroupDirection, IndexAccessor, IndexDescriptor,
    IndexState, LABEL_BLOCK_SIZE, MemoryCountsStore, MemoryIndex, MemoryStore,
    MemoryTokenScanStore, MetaDataRecord, NAME_BLOCK_SIZE, NULL_REFERENCE, NodeLabels,
    NodeRecord, PROPERTY_BLOCKS_PER_RECORD, PropertyBlock, PropertyRecord, PropertyType, Record,
    RecordStore, RelationshipGroupRecord, RelationshipRecord, STRING_BLOCK_SIZE, SchemaRecord,
    SchemaRule, SchemaRuleKind, StoreAccess, TokenKind, TokenRecord, TokenScanReader, Value,
    encode_array, encode_dynamic_labels, encode_short_string,
};

#[derive(Debug, Clone, Default)]
struct NodeContent {
    labels: Vec<u32>,
    properties: Vec<(u32, Value)>,
}

/// Builds a consistent in-memory store, one record at a time
pub struct GraphStoreFixture {
    /// Node store
    pub nodes: Arc<MemoryStore<NodeRecord>>,
    /// Relationship store
    pub relationships: Arc<MemoryStore<RelationshipRecord>>,
    /// Relationship group store
    pub relationship_groups: Arc<MemoryStore<RelationshipGroupRecord>>,
    /// Property store
    pub properties: Arc<MemoryStore<PropertyRecord>>,
    /// Dynamic string store
    pub strings: Arc<MemoryStore<DynamicRecord>>,
    /// Dynamic array store
    pub arrays: Arc<MemoryStore<DynamicRecord>>,
    /// Dynamic node label store
    pub node_labels: Arc<MemoryStore<DynamicRecord>>,
    /// Label tokens
    pub labels: Arc<MemoryStore<TokenRecord>>,
    /// Label token names
    pub label_names: Arc<MemoryStore<DynamicRecord>>,
    /// Property key tokens
    pub property_keys: Arc<MemoryStore<TokenRecord>>,
    /// Property key token names
    pub property_key_names: Arc<MemoryStore<DynamicRecord>>,
    /// Relationship type tokens
    pub relationship_types: Arc<MemoryStore<TokenRecord>>,
    /// Relationship type token names
    pub relationship_type_names: Arc<MemoryStore<DynamicRecord>>,
    /// Schema rules
    pub schema: Arc<MemoryStore<SchemaRecord>>,
    /// Counts store, kept in step with every write
    pub counts: Arc<MemoryCountsStore>,
    /// Label scan store
    pub label_scan: Arc<MemoryTokenScanStore>,
    /// Relationship type scan store
    pub type_scan: Arc<MemoryTokenScanStore>,
    /// Neostore record
    pub meta_data: MetaDataRecord,
    indexes: Vec<(IndexDescriptor, Arc<MemoryIndex>)>,
    token_ids: HashMap<(TokenKind, String), u32>,
    written: BTreeMap<u64, NodeContent>,
}

impl Default for GraphStoreFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a memory store slot; memory stores never fail
fn read<R: Record>(store: &MemoryStore<R>, id: u64) -> R {
    store.get(id).unwrap_or_else(|_| R::unused(id))
}

/// Write `payload` as a chain of consecutive blocks, returning the first id
fn write_dynamic(store: &MemoryStore<DynamicRecord>, payload: &[u8], block_size: usize) -> u64 {
    let first = store.next_id();
    let chunks: Vec<&[u8]> = if payload.is_empty() {
        vec![payload]
    } else {
        payload.chunks(block_size).collect()
    };
    let last = chunks.len() - 1;
    for (i, chunk) in chunks.into_iter().enumerate() {
        let id = first + i as u64;
        store.write(DynamicRecord {
            id,
            in_use: true,
            next: if i == last { NULL_REFERENCE } else { id + 1 },
            data: chunk.to_vec(),
        });
    }
    first
}

impl GraphStoreFixture {
    /// Empty store
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(MemoryStore::new()),
            relationships: Arc::new(MemoryStore::new()),
            relationship_groups: Arc::new(MemoryStore::new()),
            properties: Arc::new(MemoryStore::new()),
            strings: Arc::new(MemoryStore::new()),
            arrays: Arc::new(MemoryStore::new()),
            node_labels: Arc::new(MemoryStore::new()),
            labels: Arc::new(MemoryStore::new()),
            label_names: Arc::new(MemoryStore::new()),
            property_keys: Arc::new(MemoryStore::new()),
            property_key_names: Arc::new(MemoryStore::new()),
            relationship_types: Arc::new(MemoryStore::new()),
            relationship_type_names: Arc::new(MemoryStore::new()),
            schema: Arc::new(MemoryStore::new()),
            counts: Arc::new(MemoryCountsStore::new()),
            label_scan: Arc::new(MemoryTokenScanStore::new()),
            type_scan: Arc::new(MemoryTokenScanStore::new()),
            meta_data: MetaDataRecord::unused(0),
            indexes: Vec::new(),
            token_ids: HashMap::new(),
            written: BTreeMap::new(),
        }
    }

    fn token(&mut self, kind: TokenKind, name: &str) -> u32 {
        if let Some(id) = self.token_ids.get(&(kind, name.to_string())) {
            return *id;
        }
        let (tokens, names) = match kind {
            TokenKind::Label => (&self.labels, &self.label_names),
            TokenKind::PropertyKey => (&self.property_keys, &self.property_key_names),
            TokenKind::RelationshipType => {
                (&self.relationship_types, &self.relationship_type_names)
            }
        };
        let id = tokens.next_id();
        let name_id = write_dynamic(names, name.as_bytes(), NAME_BLOCK_SIZE);
        tokens.write(TokenRecord {
            id,
            in_use: true,
            name_id,
        });
        let id = id as u32;
        self.token_ids.insert((kind, name.to_string()), id);
        id
    }

    /// Label token, created on first use
    pub fn label(&mut self, name: &str) -> u32 {
        self.token(TokenKind::Label, name)
    }

    /// Property key token, created on first use
    pub fn property_key(&mut self, name: &str) -> u32 {
        self.token(TokenKind::PropertyKey, name)
    }

    /// Relationship type token, created on first use
    pub fn relationship_type(&mut self, name: &str) -> u32 {
        self.token(TokenKind::RelationshipType, name)
    }

    fn block(&self, key: u32, value: &Value) -> PropertyBlock {
        let (property_type, value) = match value {
            Value::Bool(v) => (PropertyType::Bool, *v as u64),
            Value::Int(v) => (PropertyType::Int, *v as u64),
            Value::Float(bits) => (PropertyType::Float, *bits),
            Value::String(s) => match encode_short_string(s) {
                Some(packed) => (PropertyType::ShortString, packed),
                None => (
                    PropertyType::String,
                    write_dynamic(&self.strings, s.as_bytes(), STRING_BLOCK_SIZE),
                ),
            },
            Value::Bytes(bytes) => (
                PropertyType::Array,
                write_dynamic(&self.arrays, &encode_array(bytes), ARRAY_BLOCK_SIZE),
            ),
        };
        PropertyBlock {
            key,
            type_tag: property_type as u8,
            value,
        }
    }

    /// Write a property chain, returning its first record or `NULL_REFERENCE`
    fn write_properties(&self, properties: &[(u32, Value)]) -> u64 {
        if properties.is_empty() {
            return NULL_REFERENCE;
        }
        let blocks: Vec<PropertyBlock> = properties
            .iter()
            .map(|(key, value)| self.block(*key, value))
            .collect();
        let first = self.properties.next_id();
        let records: Vec<&[PropertyBlock]> = blocks.chunks(PROPERTY_BLOCKS_PER_RECORD).collect();
        let last = records.len() - 1;
        for (i, chunk) in records.into_iter().enumerate() {
            let id = first + i as u64;
            self.properties.write(PropertyRecord {
                id,
                in_use: true,
                prev_prop: if i == 0 { NULL_REFERENCE } else { id - 1 },
                next_prop: if i == last { NULL_REFERENCE } else { id + 1 },
                blocks: chunk.to_vec(),
            });
        }
        first
    }

    /// Node with labels and properties
    pub fn node(&mut self, labels: &[u32], properties: &[(u32, Value)]) -> u64 {
        self.write_node(labels, properties, false)
    }

    /// Dense node; its relationships live in relationship groups
    pub fn dense_node(&mut self, labels: &[u32]) -> u64 {
        self.write_node(labels, &[], true)
    }

    fn write_node(&mut self, labels: &[u32], properties: &[(u32, Value)], dense: bool) -> u64 {
        let id = self.nodes.next_id();
        let mut sorted = labels.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let label_field = if sorted.len() <= crate::store::INLINE_LABEL_LIMIT {
            NodeLabels::Inline(sorted.clone())
        } else {
            NodeLabels::Dynamic(write_dynamic(
                &self.node_labels,
                &encode_dynamic_labels(id, &sorted),
                LABEL_BLOCK_SIZE,
            ))
        };
        let next_prop = self.write_properties(properties);
        self.nodes.write(NodeRecord {
            id,
            in_use: true,
            dense,
            next_rel: NULL_REFERENCE,
            next_prop,
            labels: label_field,
        });

        self.counts.increment(CountsKey::node(None), 1);
        for &label in &sorted {
            self.counts.increment(CountsKey::node(Some(label)), 1);
            self.label_scan.add(id, label);
        }
        let content = NodeContent {
            labels: sorted,
            properties: properties.to_vec(),
        };
        for (descriptor, index) in &self.indexes {
            if let Some(value) = indexed_value(descriptor, &content) {
                index.add(id, value);
            }
        }
        self.written.insert(id, content);
        id
    }

    /// Group of `rel_type` in a dense node's group chain, inserted in type
    /// order when missing
    fn group_for(&self, node: u64, rel_type: u32) -> u64 {
        let mut previous = NULL_REFERENCE;
        let mut current = read(&self.nodes, node).next_rel;
        while current != NULL_REFERENCE {
            let group = read(&self.relationship_groups, current);
            if group.rel_type == rel_type {
                return current;
            }
            if group.rel_type > rel_type {
                break;
            }
            previous = current;
            current = group.next;
        }
        let id = self.relationship_groups.next_id();
        self.relationship_groups.write(RelationshipGroupRecord {
            id,
            in_use: true,
            rel_type,
            next: current,
            owning_node: node,
            ..RelationshipGroupRecord::unused(id)
        });
        if previous == NULL_REFERENCE {
            self.nodes.update(node, |n| n.next_rel = id);
        } else {
            self.relationship_groups.update(previous, |g| g.next = id);
        }
        id
    }

    /// Point `node`'s chain for `rel` at `id`, returning the previous head
    fn swap_chain_head(&self, node: u64, rel: &RelationshipRecord) -> u64 {
        let record = read(&self.nodes, node);
        if !record.dense {
            self.nodes.update(node, |n| n.next_rel = rel.id);
            return record.next_rel;
        }
        let Some(direction) = GroupDirection::of(rel, node) else {
            return NULL_REFERENCE;
        };
        let group = self.group_for(node, rel.rel_type);
        let previous = read(&self.relationship_groups, group).first(direction);
        self.relationship_groups
            .update(group, |g| g.set_first(direction, rel.id));
        previous
    }

    /// Relationship inserted at the head of both endpoint chains
    pub fn relationship(&mut self, source: u64, target: u64, rel_type: u32) -> u64 {
        let id = self.relationships.next_id();
        let mut rel = RelationshipRecord {
            id,
            in_use: true,
            first_node: source,
            second_node: target,
            rel_type,
            ..RelationshipRecord::unused(id)
        };
        for &side in rel.sides() {
            let node = rel.node(side);
            let old_head = self.swap_chain_head(node, &rel);
            let mut length = 1;
            if old_head != NULL_REFERENCE {
                self.relationships.update(old_head, |head| {
                    if let Some(head_side) = head.side_of(node) {
                        length += head.prev(head_side);
                        head.set_prev(head_side, id);
                        head.set_first_in_chain(head_side, false);
                        if head.is_loop() {
                            head.mirror_loop();
                        }
                    }
                });
            }
            rel.set_prev(side, length);
            rel.set_next(side, old_head);
            rel.set_first_in_chain(side, true);
        }
        if rel.is_loop() {
            rel.mirror_loop();
        }
        self.relationships.write(rel);

        self.type_scan.add(id, rel_type);
        let rel_type = Some(rel_type);
        self.counts.increment(CountsKey::relationship(None, None, None), 1);
        self.counts
            .increment(CountsKey::relationship(None, rel_type, None), 1);
        for label in self.labels_of(source) {
            self.counts
                .increment(CountsKey::relationship(Some(label), None, None), 1);
            self.counts
                .increment(CountsKey::relationship(Some(label), rel_type, None), 1);
        }
        for label in self.labels_of(target) {
            self.counts
                .increment(CountsKey::relationship(None, None, Some(label)), 1);
            self.counts
                .increment(CountsKey::relationship(None, rel_type, Some(label)), 1);
        }
        id
    }

    fn labels_of(&self, node: u64) -> Vec<u32> {
        self.written
            .get(&node)
            .map(|content| content.labels.clone())
            .unwrap_or_default()
    }

    /// Online index on `label`/`key`, populated from the nodes written so
    /// far; a unique index also gets its owning constraint. Returns the
    /// index rule id.
    pub fn index(&mut self, label: u32, key: u32, unique: bool) -> u64 {
        let id = self.schema.next_id();
        let owning_constraint = unique.then_some(id + 1);
        self.schema.write(SchemaRecord {
            id,
            in_use: true,
            rule: Some(SchemaRule {
                label,
                property_keys: vec![key],
                kind: SchemaRuleKind::Index {
                    unique,
                    owning_constraint,
                },
            }),
        });
        if let Some(constraint) = owning_constraint {
            self.schema.write(SchemaRecord {
                id: constraint,
                in_use: true,
                rule: Some(SchemaRule {
                    label,
                    property_keys: vec![key],
                    kind: SchemaRuleKind::UniquenessConstraint { owned_index: id },
                }),
            });
        }
        let descriptor = IndexDescriptor {
            id,
            label,
            property_key: key,
            unique,
            state: IndexState::Online,
        };
        let index = Arc::new(MemoryIndex::new());
        for (node, content) in &self.written {
            if let Some(value) = indexed_value(&descriptor, content) {
                index.add(*node, value);
            }
        }
        self.indexes.push((descriptor, index));
        id
    }

    /// Entries of the index created by [`index`](Self::index)
    pub fn index_accessor(&self, index: u64) -> Arc<MemoryIndex> {
        self.indexes
            .iter()
            .find(|(descriptor, _)| descriptor.id == index)
            .map(|(_, accessor)| accessor.clone())
            .unwrap_or_default()
    }

    /// Change the population state of an index
    pub fn set_index_state(&mut self, index: u64, state: IndexState) {
        for (descriptor, _) in &mut self.indexes {
            if descriptor.id == index {
                descriptor.state = state;
            }
        }
    }

    /// Graph property on the neostore record; returns its property record
    pub fn graph_property(&mut self, key: u32, value: Value) -> u64 {
        let first = self.write_properties(&[(key, value)]);
        let old = self.meta_data.next_prop;
        if old != NULL_REFERENCE {
            self.properties.update(first, |r| r.next_prop = old);
            self.properties.update(old, |r| r.prev_prop = first);
        }
        self.meta_data.next_prop = first;
        first
    }

    /// Random consistent graph: a few labels, types and keys, one in ten
    /// nodes dense, relationships between uniformly chosen endpoints
    pub fn random_graph(&mut self, seed: u64, nodes: usize, relationships: usize) {
        let mut rng = StdRng::seed_from_u64(seed);
        let labels: Vec<u32> = ["Person", "City", "Company"]
            .iter()
            .map(|name| self.label(name))
            .collect();
        let types: Vec<u32> = ["KNOWS", "LIVES_IN"]
            .iter()
            .map(|name| self.relationship_type(name))
            .collect();
        let name = self.property_key("name");
        let age = self.property_key("age");

        let mut ids = Vec::with_capacity(nodes);
        for i in 0..nodes {
            let node_labels: Vec<u32> = labels
                .iter()
                .copied()
                .filter(|_| rng.gen_bool(0.4))
                .collect();
            let id = if rng.gen_bool(0.1) {
                self.dense_node(&node_labels)
            } else {
                let mut properties = vec![(name, Value::String(format!("node-{}", i)))];
                if rng.gen_bool(0.5) {
                    properties.push((age, Value::Int(rng.gen_range(0..100))));
                }
                self.node(&node_labels, &properties)
            };
            ids.push(id);
        }
        if ids.is_empty() {
            return;
        }
        for _ in 0..relationships {
            let source = ids[rng.gen_range(0..ids.len())];
            let target = ids[rng.gen_range(0..ids.len())];
            let rel_type = types[rng.gen_range(0..types.len())];
            self.relationship(source, target, rel_type);
        }
    }

    /// Read-only view of every store
    pub fn store_access(&self) -> StoreAccess {
        StoreAccess {
            nodes: self.nodes.clone(),
            relationships: self.relationships.clone(),
            relationship_groups: self.relationship_groups.clone(),
            properties: self.properties.clone(),
            strings: self.strings.clone(),
            arrays: self.arrays.clone(),
            node_labels: self.node_labels.clone(),
            labels: self.labels.clone(),
            label_names: self.label_names.clone(),
            property_keys: self.property_keys.clone(),
            property_key_names: self.property_key_names.clone(),
            relationship_types: self.relationship_types.clone(),
            relationship_type_names: self.relationship_type_names.clone(),
            schema: self.schema.clone(),
            meta_data: self.meta_data.clone(),
            counts: self.counts.clone(),
            label_scan: Some(self.label_scan.clone() as Arc<dyn TokenScanReader>),
            relationship_type_scan: Some(self.type_scan.clone() as Arc<dyn TokenScanReader>),
            indexes: self
                .indexes
                .iter()
                .map(|(descriptor, index)| {
                    (descriptor.clone(), index.clone() as Arc<dyn IndexAccessor>)
                })
                .collect(),
        }
    }

    /// Check context reporting into a fresh memory sink
    pub fn check_context(&self) -> Arc<CheckContext> {
        self.check_context_with_sink(Arc::new(MemorySink::new()))
    }

    /// Check context with default flags reporting into `sink`
    pub fn check_context_with_sink(&self, sink: Arc<MemorySink>) -> Arc<CheckContext> {
        let reporter =
            ConsistencyReporter::new(Arc::new(ConsistencySummaryStatistics::new()), sink);
        let ctx = CheckContext::new(
            Arc::new(self.store_access()),
            reporter,
            ConsistencyFlags::default(),
            Vec::new(),
            StopControl::new(),
        )
        .expect("memory stores load without errors");
        Arc::new(ctx)
    }
}

fn indexed_value(descriptor: &IndexDescriptor, content: &NodeContent) -> Option<Value> {
    if !content.labels.contains(&descriptor.label) {
        return None;
    }
    content
        .properties
        .iter()
        .find(|(key, _)| *key == descriptor.property_key)
        .map(|(_, value)| value.clone())
}

/// Run `checker` over `records` in one unfiltered pass on the calling
/// thread, then resolve its deferred checks and complete it
pub fn check_records<C: RecordChecker>(
    checker: &C,
    ctx: &CheckContext,
    records: impl IntoIterator<Item = C::Record>,
) -> Result<()> {
    let access = FilteringRecordAccess::new(ctx.direct_access(), PassPlan::unfiltered());
    checker.pass_started(&access);
    let queue = QueueScope::all(0);
    let scope = CheckScope {
        ctx,
        access: &access,
        queue: &queue,
    };
    for record in records {
        checker.check(&record, &scope)?;
    }
    checker.check_deferred(ctx)?;
    checker.complete(ctx)
}
