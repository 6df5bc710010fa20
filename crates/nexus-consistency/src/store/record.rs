//! Record kinds read by the checker
//!
//! Every record is addressed by a dense `u64` id within its store. Pointers
//! between records are plain ids; [`NULL_REFERENCE`] terminates a chain.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Null pointer sentinel
pub const NULL_REFERENCE: u64 = u64::MAX;

/// Null token id sentinel
pub const NO_TOKEN: u32 = u32::MAX;

/// Property blocks held by one property record
pub const PROPERTY_BLOCKS_PER_RECORD: usize = 4;

/// Payload capacity of a string store block
pub const STRING_BLOCK_SIZE: usize = 120;

/// Payload capacity of an array store block
pub const ARRAY_BLOCK_SIZE: usize = 120;

/// Payload capacity of a dynamic node label block
pub const LABEL_BLOCK_SIZE: usize = 60;

/// Payload capacity of a token name block
pub const NAME_BLOCK_SIZE: usize = 30;

/// Labels stored inline in the node record
pub const INLINE_LABEL_LIMIT: usize = 5;

/// Longest string stored inline in a property block
pub const SHORT_STRING_MAX_LEN: usize = 7;

/// Common surface of every record kind
pub trait Record: Clone + Send + Sync + fmt::Debug + 'static {
    /// Record id
    fn id(&self) -> u64;

    /// In-use flag
    fn in_use(&self) -> bool;

    /// The record a store returns for an unused slot
    fn unused(id: u64) -> Self;
}

/// Labels of a node, either inline or in a dynamic label chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeLabels {
    /// Label ids stored in the node record
    Inline(Vec<u32>),
    /// First block of the node's dynamic label chain
    Dynamic(u64),
}

/// Node record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Node id
    pub id: u64,
    /// In-use flag
    pub in_use: bool,
    /// Dense nodes keep relationships in per-type groups
    pub dense: bool,
    /// First relationship, or first relationship group when dense
    pub next_rel: u64,
    /// First property record
    pub next_prop: u64,
    /// Label storage
    pub labels: NodeLabels,
}

impl Record for NodeRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: u64) -> Self {
        Self {
            id,
            in_use: false,
            dense: false,
            next_rel: NULL_REFERENCE,
            next_prop: NULL_REFERENCE,
            labels: NodeLabels::Inline(Vec::new()),
        }
    }
}

/// One endpoint side of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainSide {
    /// First (start) node
    Source,
    /// Second (end) node
    Target,
}

impl fmt::Display for ChainSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Relationship record
///
/// A relationship sits in two doubly linked chains, one per endpoint. The
/// `prev` field of a side flagged first-in-chain holds the chain length
/// instead of a pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRecord {
    /// Relationship id
    pub id: u64,
    /// In-use flag
    pub in_use: bool,
    /// Start node
    pub first_node: u64,
    /// End node
    pub second_node: u64,
    /// Relationship type token
    pub rel_type: u32,
    /// Previous relationship in the start node's chain, or chain length
    pub first_prev_rel: u64,
    /// Next relationship in the start node's chain
    pub first_next_rel: u64,
    /// Previous relationship in the end node's chain, or chain length
    pub second_prev_rel: u64,
    /// Next relationship in the end node's chain
    pub second_next_rel: u64,
    /// Head of the start node's chain
    pub first_in_first_chain: bool,
    /// Head of the end node's chain
    pub first_in_second_chain: bool,
    /// First property record
    pub next_prop: u64,
}

impl RelationshipRecord {
    /// Node at one side
    pub fn node(&self, side: ChainSide) -> u64 {
        match side {
            ChainSide::Source => self.first_node,
            ChainSide::Target => self.second_node,
        }
    }

    /// Previous pointer (or chain length) at one side
    pub fn prev(&self, side: ChainSide) -> u64 {
        match side {
            ChainSide::Source => self.first_prev_rel,
            ChainSide::Target => self.second_prev_rel,
        }
    }

    /// Next pointer at one side
    pub fn next(&self, side: ChainSide) -> u64 {
        match side {
            ChainSide::Source => self.first_next_rel,
            ChainSide::Target => self.second_next_rel,
        }
    }

    /// First-in-chain flag at one side
    pub fn first_in_chain(&self, side: ChainSide) -> bool {
        match side {
            ChainSide::Source => self.first_in_first_chain,
            ChainSide::Target => self.first_in_second_chain,
        }
    }

    /// Both endpoints are the same node
    pub fn is_loop(&self) -> bool {
        self.first_node == self.second_node
    }

    /// Side through which `node` reaches this relationship. Loops answer
    /// [`ChainSide::Source`].
    pub fn side_of(&self, node: u64) -> Option<ChainSide> {
        if self.first_node == node {
            Some(ChainSide::Source)
        } else if self.second_node == node {
            Some(ChainSide::Target)
        } else {
            None
        }
    }

    /// Sides that carry their own chain pointers
    pub fn sides(&self) -> &'static [ChainSide] {
        if self.is_loop() {
            &[ChainSide::Source]
        } else {
            &[ChainSide::Source, ChainSide::Target]
        }
    }

    pub(crate) fn set_prev(&mut self, side: ChainSide, value: u64) {
        match side {
            ChainSide::Source => self.first_prev_rel = value,
            ChainSide::Target => self.second_prev_rel = value,
        }
    }

    pub(crate) fn set_next(&mut self, side: ChainSide, value: u64) {
        match side {
            ChainSide::Source => self.first_next_rel = value,
            ChainSide::Target => self.second_next_rel = value,
        }
    }

    pub(crate) fn set_first_in_chain(&mut self, side: ChainSide, value: bool) {
        match side {
            ChainSide::Source => self.first_in_first_chain = value,
            ChainSide::Target => self.first_in_second_chain = value,
        }
    }

    /// Copy source-side chain fields onto the target side of a loop
    pub(crate) fn mirror_loop(&mut self) {
        if self.is_loop() {
            self.second_prev_rel = self.first_prev_rel;
            self.second_next_rel = self.first_next_rel;
            self.first_in_second_chain = self.first_in_first_chain;
        }
    }
}

impl Record for RelationshipRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: u64) -> Self {
        Self {
            id,
            in_use: false,
            first_node: NULL_REFERENCE,
            second_node: NULL_REFERENCE,
            rel_type: NO_TOKEN,
            first_prev_rel: NULL_REFERENCE,
            first_next_rel: NULL_REFERENCE,
            second_prev_rel: NULL_REFERENCE,
            second_next_rel: NULL_REFERENCE,
            first_in_first_chain: false,
            first_in_second_chain: false,
            next_prop: NULL_REFERENCE,
        }
    }
}

/// Chain direction inside a relationship group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupDirection {
    /// Relationships starting at the owner
    Outgoing,
    /// Relationships ending at the owner
    Incoming,
    /// Relationships starting and ending at the owner
    Loop,
}

impl GroupDirection {
    /// All directions in record field order
    pub const ALL: [GroupDirection; 3] = [Self::Outgoing, Self::Incoming, Self::Loop];

    /// Direction of `rel` as seen from `node`
    pub fn of(rel: &RelationshipRecord, node: u64) -> Option<Self> {
        if rel.first_node == node && rel.second_node == node {
            Some(Self::Loop)
        } else if rel.first_node == node {
            Some(Self::Outgoing)
        } else if rel.second_node == node {
            Some(Self::Incoming)
        } else {
            None
        }
    }

    /// Chain side the owner occupies for this direction
    pub fn side(self) -> ChainSide {
        match self {
            Self::Outgoing | Self::Loop => ChainSide::Source,
            Self::Incoming => ChainSide::Target,
        }
    }
}

impl fmt::Display for GroupDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outgoing => write!(f, "outgoing"),
            Self::Incoming => write!(f, "incoming"),
            Self::Loop => write!(f, "loop"),
        }
    }
}

/// Relationship group record, one per (dense node, relationship type)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipGroupRecord {
    /// Group id
    pub id: u64,
    /// In-use flag
    pub in_use: bool,
    /// Relationship type of every chain in this group
    pub rel_type: u32,
    /// Next group of the same owner, higher type
    pub next: u64,
    /// Head of the outgoing chain
    pub first_out: u64,
    /// Head of the incoming chain
    pub first_in: u64,
    /// Head of the loop chain
    pub first_loop: u64,
    /// Dense node owning the group
    pub owning_node: u64,
}

impl RelationshipGroupRecord {
    /// Chain head for one direction
    pub fn first(&self, direction: GroupDirection) -> u64 {
        match direction {
            GroupDirection::Outgoing => self.first_out,
            GroupDirection::Incoming => self.first_in,
            GroupDirection::Loop => self.first_loop,
        }
    }

    pub(crate) fn set_first(&mut self, direction: GroupDirection, value: u64) {
        match direction {
            GroupDirection::Outgoing => self.first_out = value,
            GroupDirection::Incoming => self.first_in = value,
            GroupDirection::Loop => self.first_loop = value,
        }
    }
}

impl Record for RelationshipGroupRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: u64) -> Self {
        Self {
            id,
            in_use: false,
            rel_type: NO_TOKEN,
            next: NULL_REFERENCE,
            first_out: NULL_REFERENCE,
            first_in: NULL_REFERENCE,
            first_loop: NULL_REFERENCE,
            owning_node: NULL_REFERENCE,
        }
    }
}

/// Property value type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropertyType {
    /// Inline boolean
    Bool = 1,
    /// Inline signed integer
    Int = 2,
    /// Inline float, raw bits
    Float = 3,
    /// String of at most seven bytes, inline
    ShortString = 4,
    /// String in the dynamic string store
    String = 5,
    /// Byte array in the dynamic array store
    Array = 6,
}

impl PropertyType {
    /// Decode a type tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Bool),
            2 => Some(Self::Int),
            3 => Some(Self::Float),
            4 => Some(Self::ShortString),
            5 => Some(Self::String),
            6 => Some(Self::Array),
            _ => None,
        }
    }

    /// Value lives in a dynamic store
    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::String | Self::Array)
    }
}

/// One key/value slot of a property record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyBlock {
    /// Property key token
    pub key: u32,
    /// Raw type tag, see [`PropertyType`]
    pub type_tag: u8,
    /// Inline payload, or first dynamic record for strings and arrays
    pub value: u64,
}

impl PropertyBlock {
    /// Decoded type tag
    pub fn property_type(&self) -> Option<PropertyType> {
        PropertyType::from_tag(self.type_tag)
    }
}

/// Property record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    /// Property record id
    pub id: u64,
    /// In-use flag
    pub in_use: bool,
    /// Previous record in the owner's chain
    pub prev_prop: u64,
    /// Next record in the owner's chain
    pub next_prop: u64,
    /// Up to [`PROPERTY_BLOCKS_PER_RECORD`] blocks
    pub blocks: Vec<PropertyBlock>,
}

impl Record for PropertyRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: u64) -> Self {
        Self {
            id,
            in_use: false,
            prev_prop: NULL_REFERENCE,
            next_prop: NULL_REFERENCE,
            blocks: Vec::new(),
        }
    }
}

/// Block of a dynamic (overflow) store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicRecord {
    /// Block id
    pub id: u64,
    /// In-use flag
    pub in_use: bool,
    /// Next block of the same value
    pub next: u64,
    /// Payload
    pub data: Vec<u8>,
}

impl Record for DynamicRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: u64) -> Self {
        Self {
            id,
            in_use: false,
            next: NULL_REFERENCE,
            data: Vec::new(),
        }
    }
}

/// Label, property key or relationship type token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// Token id
    pub id: u64,
    /// In-use flag
    pub in_use: bool,
    /// First block of the name in the matching name store
    pub name_id: u64,
}

impl Record for TokenRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: u64) -> Self {
        Self {
            id,
            in_use: false,
            name_id: NULL_REFERENCE,
        }
    }
}

/// Kind-specific part of a schema rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaRuleKind {
    /// Index over (label, keys)
    Index {
        /// Index enforces uniqueness
        unique: bool,
        /// Constraint rule owning a unique index
        owning_constraint: Option<u64>,
    },
    /// Uniqueness constraint over (label, keys)
    UniquenessConstraint {
        /// Index rule backing the constraint
        owned_index: u64,
    },
}

/// Decoded schema rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaRule {
    /// Label the rule applies to
    pub label: u32,
    /// Property keys covered
    pub property_keys: Vec<u32>,
    /// Rule kind
    pub kind: SchemaRuleKind,
}

impl SchemaRule {
    /// True for index rules
    pub fn is_index(&self) -> bool {
        matches!(self.kind, SchemaRuleKind::Index { .. })
    }
}

/// Schema store record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRecord {
    /// Rule id
    pub id: u64,
    /// In-use flag
    pub in_use: bool,
    /// Decoded rule; `None` when the stored bytes could not be decoded
    pub rule: Option<SchemaRule>,
}

impl Record for SchemaRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn unused(id: u64) -> Self {
        Self {
            id,
            in_use: false,
            rule: None,
        }
    }
}

/// The neostore metadata record owning the graph property chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDataRecord {
    /// First graph property record
    pub next_prop: u64,
}

impl Record for MetaDataRecord {
    fn id(&self) -> u64 {
        0
    }

    fn in_use(&self) -> bool {
        true
    }

    fn unused(_id: u64) -> Self {
        Self {
            next_prop: NULL_REFERENCE,
        }
    }
}

/// Decoded property value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Float as raw IEEE-754 bits, so values stay hashable
    Float(u64),
    /// UTF-8 string
    String(String),
    /// Byte array
    Bytes(Vec<u8>),
}

impl Value {
    /// Float value
    pub fn float(value: f64) -> Self {
        Self::Float(value.to_bits())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Self::String(s) => write!(f, "\"{}\"", s),
            Self::Bytes(b) => write!(f, "{:?}", b),
        }
    }
}

/// Pack a short string into a block value: bytes little endian, length in the top byte
pub fn encode_short_string(s: &str) -> Option<u64> {
    let bytes = s.as_bytes();
    if bytes.len() > SHORT_STRING_MAX_LEN {
        return None;
    }
    let mut raw = [0u8; 8];
    raw[..bytes.len()].copy_from_slice(bytes);
    raw[7] = bytes.len() as u8;
    Some(u64::from_le_bytes(raw))
}

/// Inverse of [`encode_short_string`]
pub fn decode_short_string(value: u64) -> Option<String> {
    let raw = value.to_le_bytes();
    let len = raw[7] as usize;
    if len > SHORT_STRING_MAX_LEN {
        return None;
    }
    String::from_utf8(raw[..len].to_vec()).ok()
}

/// Payload of a dynamic array value: length header then the bytes
pub fn encode_array(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 4);
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
    out
}

/// Inverse of [`encode_array`]; `None` when the header disagrees with the payload
pub fn decode_array(payload: &[u8]) -> Option<Vec<u8>> {
    let header: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    let len = u32::from_le_bytes(header) as usize;
    let body = &payload[4..];
    (body.len() == len).then(|| body.to_vec())
}

/// Payload of a dynamic label chain: owner node id then sorted label ids
pub fn encode_dynamic_labels(owner: u64, labels: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + labels.len() * 4);
    out.extend_from_slice(&owner.to_le_bytes());
    for label in labels {
        out.extend_from_slice(&label.to_le_bytes());
    }
    out
}

/// Inverse of [`encode_dynamic_labels`]
pub fn decode_dynamic_labels(payload: &[u8]) -> Option<(u64, Vec<u32>)> {
    let owner: [u8; 8] = payload.get(..8)?.try_into().ok()?;
    let rest = &payload[8..];
    if rest.len() % 4 != 0 {
        return None;
    }
    let labels = rest
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Some((u64::from_le_bytes(owner), labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(first: u64, second: u64) -> RelationshipRecord {
        RelationshipRecord {
            id: 1,
            in_use: true,
            first_node: first,
            second_node: second,
            rel_type: 0,
            ..RelationshipRecord::unused(1)
        }
    }

    #[test]
    fn test_side_of_prefers_source_for_loops() {
        assert_eq!(rel(3, 3).side_of(3), Some(ChainSide::Source));
        assert_eq!(rel(3, 4).side_of(4), Some(ChainSide::Target));
        assert_eq!(rel(3, 4).side_of(5), None);
        assert_eq!(rel(3, 3).sides().len(), 1);
    }

    #[test]
    fn test_mirror_loop_copies_source_side() {
        let mut r = rel(2, 2);
        r.first_prev_rel = 7;
        r.first_next_rel = 9;
        r.first_in_first_chain = true;
        r.mirror_loop();
        assert_eq!(r.second_prev_rel, 7);
        assert_eq!(r.second_next_rel, 9);
        assert!(r.first_in_second_chain);
    }

    #[test]
    fn test_group_direction() {
        assert_eq!(GroupDirection::of(&rel(1, 1), 1), Some(GroupDirection::Loop));
        assert_eq!(GroupDirection::of(&rel(1, 2), 1), Some(GroupDirection::Outgoing));
        assert_eq!(GroupDirection::of(&rel(1, 2), 2), Some(GroupDirection::Incoming));
        assert_eq!(GroupDirection::Incoming.side(), ChainSide::Target);
    }

    #[test]
    fn test_short_string_encoding() {
        let packed = encode_short_string("nexus").unwrap();
        assert_eq!(decode_short_string(packed).as_deref(), Some("nexus"));
        assert_eq!(decode_short_string(encode_short_string("").unwrap()).as_deref(), Some(""));
        assert!(encode_short_string("too long!").is_none());
    }

    #[test]
    fn test_dynamic_label_payload() {
        let payload = encode_dynamic_labels(42, &[1, 5, 9]);
        assert_eq!(decode_dynamic_labels(&payload), Some((42, vec![1, 5, 9])));
        assert_eq!(decode_dynamic_labels(&payload[..10]), None);
    }

    #[test]
    fn test_array_payload_header() {
        let payload = encode_array(&[1, 2, 3]);
        assert_eq!(decode_array(&payload), Some(vec![1, 2, 3]));
        assert_eq!(decode_array(&payload[..5]), None);
    }

    #[test]
    fn test_property_type_tags() {
        assert_eq!(PropertyType::from_tag(5), Some(PropertyType::String));
        assert!(PropertyType::from_tag(0).is_none());
        assert!(PropertyType::from_tag(7).is_none());
        assert!(PropertyType::Array.is_dynamic());
        assert!(!PropertyType::ShortString.is_dynamic());
    }
}
