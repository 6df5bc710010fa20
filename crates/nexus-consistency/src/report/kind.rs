//! Inconsistency catalog
//!
//! One flat enum of everything a checker can find, each variant carrying the
//! ids needed to locate the problem. Which record types a kind may be
//! reported against, its severity and its message all live in the match
//! tables below.

use std::fmt;

use super::{RecordType, Severity};
use crate::store::{ChainSide, CountsKey, GroupDirection, NULL_REFERENCE, Value};

/// Dynamic value store referenced from a property block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicValueKind {
    /// String store
    String,
    /// Array store
    Array,
}

impl fmt::Display for DynamicValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// Schema rule a rule depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaObligation {
    /// A unique index needs an owning constraint
    UniquenessConstraint,
    /// A constraint needs its backing index rule
    ConstraintIndexRule,
}

impl fmt::Display for SchemaObligation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UniquenessConstraint => write!(f, "uniqueness constraint"),
            Self::ConstraintIndexRule => write!(f, "constraint index rule"),
        }
    }
}

/// Everything a checker can report
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InconsistencyKind {
    // Property chain heads, shared by nodes, relationships and the neostore
    /// Owner references a property record that is not in use
    PropertyNotInUse { property: u64 },
    /// Owner references a property record that has a previous record
    PropertyNotFirstInChain { property: u64 },
    /// A property key appears twice in one owner's chain
    PropertyKeyNotUniqueInChain { key: u32 },
    /// Two owners reference the same property chain
    PropertyChainMultipleOwners,

    // Nodes
    /// Node references a relationship that is not in use
    RelationshipNotInUse { relationship: u64 },
    /// Node references a relationship of two other nodes
    RelationshipForOtherNode { relationship: u64 },
    /// Node references a relationship that is not first in its chain
    RelationshipNotFirstInChain { relationship: u64, side: ChainSide },
    /// Node degree stored and observed disagree
    RelationshipChainLengthMismatch { expected: u64, observed: u64 },
    /// Label token id is not in use
    LabelNotInUse { label: u32 },
    /// Label listed twice on one node
    LabelDuplicate { label: u32 },
    /// Labels not in ascending order
    LabelsOutOfOrder { largest: u32, smallest: u32 },
    /// Dynamic label block is not in use
    DynamicLabelRecordNotInUse { record: u64 },
    /// Dynamic label chain loops
    DynamicLabelChainCycle { record: u64 },
    /// Dense node references a group that is not in use
    RelationshipGroupNotInUse { group: u64 },
    /// Dense node references a group owned by another node
    RelationshipGroupHasOtherOwner { group: u64, owner: u64 },
    /// Node with indexed label and property is missing from the index
    NotIndexed { index: u64, value: Value },
    /// Node indexed more than once under one value
    IndexedMultipleTimes { index: u64, count: usize },
    /// Another node holds the same value in a unique index
    UniqueIndexNotUnique { index: u64, duplicate_node: u64 },
    /// Entity token missing from the scan store
    TokenNotInScanStore { token: u32 },

    // Relationships and relationship groups
    /// Type token is the null token
    IllegalRelationshipType,
    /// Type token is not in use
    RelationshipTypeNotInUse { rel_type: u32 },
    /// Endpoint is the null reference
    IllegalNode { side: ChainSide },
    /// Endpoint node is not in use
    NodeNotInUse { side: ChainSide, node: u64 },
    /// First-in-chain relationship is not the node's first relationship
    NodeDoesNotReferenceBack { side: ChainSide, node: u64 },
    /// Previous relationship is not in use
    PrevNotInUse { side: ChainSide, prev: u64 },
    /// Next relationship is not in use
    NextNotInUse { side: ChainSide, next: u64 },
    /// Previous relationship does not touch this side's node
    PrevReferencesOtherNodes { side: ChainSide, prev: u64 },
    /// Next relationship does not touch this side's node
    NextReferencesOtherNodes { side: ChainSide, next: u64 },
    /// Previous relationship's next pointer is not this relationship
    PrevDoesNotReferenceBack { side: ChainSide, prev: u64 },
    /// Next relationship's previous pointer is not this relationship
    NextDoesNotReferenceBack { side: ChainSide, next: u64 },
    /// Chain length stored at the head disagrees with the relationships seen
    ChainLengthMismatch {
        side: ChainSide,
        node: u64,
        expected: u64,
        observed: u64,
    },

    // Relationship groups
    /// Owner is the null reference
    IllegalOwner,
    /// Owner node is not in use
    OwnerNotInUse { owner: u64 },
    /// Next group is not in use
    NextGroupNotInUse { next: u64 },
    /// Next group belongs to another node
    NextGroupHasOtherOwner { next: u64, owner: u64 },
    /// Next group does not have a higher type
    InvalidTypeSortOrder { next: u64 },
    /// Chain head is not in use
    FirstRelationshipNotInUse {
        direction: GroupDirection,
        relationship: u64,
    },
    /// Chain head is not first in the owner's chain
    FirstRelationshipNotFirstInChain {
        direction: GroupDirection,
        relationship: u64,
    },
    /// Chain head has another type
    FirstRelationshipOfOtherType {
        direction: GroupDirection,
        relationship: u64,
    },

    // Properties
    /// Block key is the null token
    IllegalPropertyKey { block: usize },
    /// Property key token not in use
    PropertyKeyNotInUse { key: u32 },
    /// Block type tag not recognized
    InvalidPropertyType { key: u32, type_tag: u8 },
    /// Previous property record not in use
    PrevPropertyNotInUse { prev: u64 },
    /// Next property record not in use
    NextPropertyNotInUse { next: u64 },
    /// Previous property record's next pointer is not this record
    PrevPropertyDoesNotReferenceBack { prev: u64 },
    /// Next property record's previous pointer is not this record
    NextPropertyDoesNotReferenceBack { next: u64 },
    /// Value block not in use
    DynamicValueNotInUse {
        key: u32,
        kind: DynamicValueKind,
        record: u64,
    },
    /// Value block is empty
    DynamicValueEmpty {
        key: u32,
        kind: DynamicValueKind,
        record: u64,
    },
    /// Value block referenced by more than one property
    DynamicValueMultipleOwners {
        key: u32,
        kind: DynamicValueKind,
        record: u64,
    },
    /// First record of a chain that no owner references
    OrphanPropertyChain,
    /// Walking the chain revisited this record
    CircularPropertyChain,

    // Dynamic blocks
    /// Next block not in use
    NextBlockNotInUse { next: u64 },
    /// Block with spare capacity continues into another block
    RecordNotFullReferencesNext,
    /// Payload longer than the block capacity
    InvalidLength { length: usize },
    /// Block carries no payload
    EmptyBlock,
    /// Next block carries no payload
    EmptyNextBlock { next: u64 },
    /// Block's next pointer is itself
    SelfReferentialNext,
    /// Block reached from more than one place
    NextBlockMultipleOwners { next: u64 },
    /// Block in use but unreachable from any owner
    OrphanDynamicRecord,
    /// Dynamic label chain names an owner that does not point at it
    DynamicLabelOwnerMismatch { owner: u64 },

    // Tokens
    /// Name block not in use
    NameBlockNotInUse { record: u64 },
    /// Name is empty
    EmptyName { record: u64 },
    /// Name block shared with another token
    NameMultipleOwners { record: u64 },

    // Schema
    /// Rule bytes could not be decoded
    MalformedSchemaRule,
    /// Constraint's index does not point back at it
    UniquenessConstraintNotReferencingBack { index: u64 },
    /// Index rule's owning constraint does not point back at it
    ConstraintIndexRuleNotReferencingBack { constraint: u64 },
    /// Rule lacks a rule it depends on
    MissingObligation { obligation: SchemaObligation },
    /// Another rule already claims the same obligation
    DuplicateObligation { other: u64 },
    /// Another rule has the same content
    DuplicateRuleContent { other: u64 },

    // Scan stores and indexes
    /// Entry refers to an entity that is not in use
    EntityNotInUse { entity: u64 },
    /// Entry refers to an entity that lacks the token
    EntityDoesNotHaveExpectedToken { entity: u64, token: u32 },

    // Counts
    /// Stored count differs from observed count
    InconsistentCount {
        key: CountsKey,
        expected: u64,
        actual: u64,
    },
    /// Number of node count keys differs
    InconsistentNumberOfNodeKeys { expected: usize, actual: usize },
    /// Number of relationship count keys differs
    InconsistentNumberOfRelationshipKeys { expected: usize, actual: usize },
}

use InconsistencyKind as K;
use RecordType as T;

const PRIMITIVES: &[RecordType] = &[T::Node, T::Relationship, T::NeoStore];
const ENTITIES: &[RecordType] = &[T::Node, T::Relationship];
const DYNAMIC: &[RecordType] = &[
    T::StringProperty,
    T::ArrayProperty,
    T::NodeDynamicLabel,
    T::LabelName,
    T::PropertyKeyName,
    T::RelationshipTypeName,
];
const TOKENS: &[RecordType] = &[T::Label, T::PropertyKey, T::RelationshipType];
const SCANS: &[RecordType] = &[T::LabelScanDocument, T::RelationshipTypeScanDocument, T::Index];

impl InconsistencyKind {
    /// Record types this kind may be reported against
    pub fn record_types(&self) -> &'static [RecordType] {
        match self {
            K::PropertyNotInUse { .. }
            | K::PropertyNotFirstInChain { .. }
            | K::PropertyKeyNotUniqueInChain { .. } => PRIMITIVES,
            K::PropertyChainMultipleOwners => &[T::Property],

            K::RelationshipNotInUse { .. }
            | K::RelationshipForOtherNode { .. }
            | K::RelationshipNotFirstInChain { .. }
            | K::RelationshipChainLengthMismatch { .. }
            | K::LabelDuplicate { .. }
            | K::LabelsOutOfOrder { .. }
            | K::DynamicLabelRecordNotInUse { .. }
            | K::DynamicLabelChainCycle { .. }
            | K::RelationshipGroupNotInUse { .. }
            | K::RelationshipGroupHasOtherOwner { .. }
            | K::NotIndexed { .. }
            | K::IndexedMultipleTimes { .. }
            | K::UniqueIndexNotUnique { .. } => &[T::Node],
            K::LabelNotInUse { .. } => &[T::Node, T::Schema],
            K::TokenNotInScanStore { .. } => ENTITIES,

            K::IllegalRelationshipType | K::RelationshipTypeNotInUse { .. } => {
                &[T::Relationship, T::RelationshipGroup]
            }
            K::IllegalNode { .. }
            | K::NodeNotInUse { .. }
            | K::NodeDoesNotReferenceBack { .. }
            | K::PrevNotInUse { .. }
            | K::NextNotInUse { .. }
            | K::PrevReferencesOtherNodes { .. }
            | K::NextReferencesOtherNodes { .. }
            | K::PrevDoesNotReferenceBack { .. }
            | K::NextDoesNotReferenceBack { .. }
            | K::ChainLengthMismatch { .. } => &[T::Relationship],

            K::IllegalOwner
            | K::OwnerNotInUse { .. }
            | K::NextGroupNotInUse { .. }
            | K::NextGroupHasOtherOwner { .. }
            | K::InvalidTypeSortOrder { .. }
            | K::FirstRelationshipNotInUse { .. }
            | K::FirstRelationshipNotFirstInChain { .. }
            | K::FirstRelationshipOfOtherType { .. } => &[T::RelationshipGroup],

            K::PropertyKeyNotInUse { .. } => &[T::Property, T::Schema],
            K::IllegalPropertyKey { .. }
            | K::InvalidPropertyType { .. }
            | K::PrevPropertyNotInUse { .. }
            | K::NextPropertyNotInUse { .. }
            | K::PrevPropertyDoesNotReferenceBack { .. }
            | K::NextPropertyDoesNotReferenceBack { .. }
            | K::DynamicValueNotInUse { .. }
            | K::DynamicValueEmpty { .. }
            | K::DynamicValueMultipleOwners { .. }
            | K::OrphanPropertyChain
            | K::CircularPropertyChain => &[T::Property],

            K::NextBlockNotInUse { .. }
            | K::RecordNotFullReferencesNext
            | K::InvalidLength { .. }
            | K::EmptyBlock
            | K::EmptyNextBlock { .. }
            | K::SelfReferentialNext
            | K::NextBlockMultipleOwners { .. }
            | K::OrphanDynamicRecord => DYNAMIC,
            K::DynamicLabelOwnerMismatch { .. } => &[T::NodeDynamicLabel],

            K::NameBlockNotInUse { .. } | K::EmptyName { .. } | K::NameMultipleOwners { .. } => {
                TOKENS
            }

            K::MalformedSchemaRule
            | K::UniquenessConstraintNotReferencingBack { .. }
            | K::ConstraintIndexRuleNotReferencingBack { .. }
            | K::MissingObligation { .. }
            | K::DuplicateObligation { .. }
            | K::DuplicateRuleContent { .. } => &[T::Schema],

            K::EntityNotInUse { .. } | K::EntityDoesNotHaveExpectedToken { .. } => SCANS,

            K::InconsistentCount { .. }
            | K::InconsistentNumberOfNodeKeys { .. }
            | K::InconsistentNumberOfRelationshipKeys { .. } => &[T::Counts],
        }
    }

    /// Severity of the kind
    pub fn severity(&self) -> Severity {
        match self {
            K::RecordNotFullReferencesNext
            | K::EmptyBlock
            | K::EmptyNextBlock { .. }
            | K::EmptyName { .. }
            | K::OrphanDynamicRecord => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

fn id(value: u64) -> i64 {
    if value == NULL_REFERENCE { -1 } else { value as i64 }
}

impl fmt::Display for InconsistencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            K::PropertyNotInUse { property } => write!(
                f,
                "The property record referenced is not in use. (property={})",
                id(*property)
            ),
            K::PropertyNotFirstInChain { property } => write!(
                f,
                "The property record referenced is not the first in its chain. (property={})",
                id(*property)
            ),
            K::PropertyKeyNotUniqueInChain { key } => write!(
                f,
                "The property chain contains multiple properties with the same key. (key={})",
                key
            ),
            K::PropertyChainMultipleOwners => {
                write!(f, "The property chain is referenced by more than one owner.")
            }
            K::RelationshipNotInUse { relationship } => write!(
                f,
                "The referenced relationship record is not in use. (relationship={})",
                id(*relationship)
            ),
            K::RelationshipForOtherNode { relationship } => write!(
                f,
                "The referenced relationship record is a relationship between two other nodes. (relationship={})",
                id(*relationship)
            ),
            K::RelationshipNotFirstInChain { relationship, side } => write!(
                f,
                "The referenced relationship record is not the first in the {} relationship chain where this node is involved. (relationship={})",
                side,
                id(*relationship)
            ),
            K::RelationshipChainLengthMismatch { expected, observed } => write!(
                f,
                "The relationship chain length of this node does not match the relationships seen. (expected={}, observed={})",
                expected, observed
            ),
            K::LabelNotInUse { label } => {
                write!(f, "The label token record referenced is not in use. (label={})", label)
            }
            K::LabelDuplicate { label } => {
                write!(f, "The node record has the same label twice. (label={})", label)
            }
            K::LabelsOutOfOrder { largest, smallest } => write!(
                f,
                "The node record labels are not in ascending order. (largest={}, smallest={})",
                largest, smallest
            ),
            K::DynamicLabelRecordNotInUse { record } => write!(
                f,
                "The dynamic label record referenced is not in use. (record={})",
                id(*record)
            ),
            K::DynamicLabelChainCycle { record } => write!(
                f,
                "The dynamic label chain of this node loops back to an earlier block. (record={})",
                id(*record)
            ),
            K::RelationshipGroupNotInUse { group } => write!(
                f,
                "The referenced relationship group record is not in use. (group={})",
                id(*group)
            ),
            K::RelationshipGroupHasOtherOwner { group, owner } => write!(
                f,
                "The referenced relationship group record belongs to another node. (group={}, owner={})",
                id(*group),
                id(*owner)
            ),
            K::NotIndexed { index, value } => write!(
                f,
                "This node was not found in the expected index. (index={}, value={})",
                index, value
            ),
            K::IndexedMultipleTimes { index, count } => write!(
                f,
                "This node was found in the expected index, although multiple times. (index={}, count={})",
                index, count
            ),
            K::UniqueIndexNotUnique { index, duplicate_node } => write!(
                f,
                "The property value is not unique in the unique index. (index={}, duplicate node={})",
                index, duplicate_node
            ),
            K::TokenNotInScanStore { token } => write!(
                f,
                "This entity has a token that is missing from the scan store. (token={})",
                token
            ),
            K::IllegalRelationshipType => {
                write!(f, "The relationship type field has an illegal value.")
            }
            K::RelationshipTypeNotInUse { rel_type } => write!(
                f,
                "The relationship type record is not in use. (type={})",
                rel_type
            ),
            K::IllegalNode { side } => write!(f, "The {} node field has an illegal value.", side),
            K::NodeNotInUse { side, node } => write!(
                f,
                "The {} node is not in use. (node={})",
                side,
                id(*node)
            ),
            K::NodeDoesNotReferenceBack { side, node } => write!(
                f,
                "The {} node does not have this relationship as its first relationship. (node={})",
                side,
                id(*node)
            ),
            K::PrevNotInUse { side, prev } => write!(
                f,
                "The {} prev relationship is not in use. (prev={})",
                side,
                id(*prev)
            ),
            K::NextNotInUse { side, next } => write!(
                f,
                "The {} next relationship is not in use. (next={})",
                side,
                id(*next)
            ),
            K::PrevReferencesOtherNodes { side, prev } => write!(
                f,
                "The {} prev relationship is between two other nodes. (prev={})",
                side,
                id(*prev)
            ),
            K::NextReferencesOtherNodes { side, next } => write!(
                f,
                "The {} next relationship is between two other nodes. (next={})",
                side,
                id(*next)
            ),
            K::PrevDoesNotReferenceBack { side, prev } => write!(
                f,
                "The {} prev relationship does not have this relationship as its next. (prev={})",
                side,
                id(*prev)
            ),
            K::NextDoesNotReferenceBack { side, next } => write!(
                f,
                "The {} next relationship does not have this relationship as its prev. (next={})",
                side,
                id(*next)
            ),
            K::ChainLengthMismatch {
                side,
                node,
                expected,
                observed,
            } => write!(
                f,
                "The {} chain length stored in this relationship does not match the chain of node {}. (expected={}, observed={})",
                side,
                id(*node),
                expected,
                observed
            ),
            K::IllegalOwner => write!(f, "The owner field has an illegal value."),
            K::OwnerNotInUse { owner } => {
                write!(f, "The owning node record is not in use. (owner={})", id(*owner))
            }
            K::NextGroupNotInUse { next } => write!(
                f,
                "The next relationship group record is not in use. (next={})",
                id(*next)
            ),
            K::NextGroupHasOtherOwner { next, owner } => write!(
                f,
                "The next relationship group record belongs to another node. (next={}, owner={})",
                id(*next),
                id(*owner)
            ),
            K::InvalidTypeSortOrder { next } => write!(
                f,
                "The next relationship group does not have a higher type. (next={})",
                id(*next)
            ),
            K::FirstRelationshipNotInUse {
                direction,
                relationship,
            } => write!(
                f,
                "The first {} relationship is not in use. (relationship={})",
                direction,
                id(*relationship)
            ),
            K::FirstRelationshipNotFirstInChain {
                direction,
                relationship,
            } => write!(
                f,
                "The first {} relationship is not the first in the owner's chain. (relationship={})",
                direction,
                id(*relationship)
            ),
            K::FirstRelationshipOfOtherType {
                direction,
                relationship,
            } => write!(
                f,
                "The first {} relationship has another type than the group. (relationship={})",
                direction,
                id(*relationship)
            ),
            K::IllegalPropertyKey { block } => write!(
                f,
                "The property key field has an illegal value. (block={})",
                block
            ),
            K::PropertyKeyNotInUse { key } => write!(
                f,
                "The property key token record is not in use. (key={})",
                key
            ),
            K::InvalidPropertyType { key, type_tag } => write!(
                f,
                "The property type field has an illegal value. (key={}, type={})",
                key, type_tag
            ),
            K::PrevPropertyNotInUse { prev } => write!(
                f,
                "The previous property record is not in use. (prev={})",
                id(*prev)
            ),
            K::NextPropertyNotInUse { next } => write!(
                f,
                "The next property record is not in use. (next={})",
                id(*next)
            ),
            K::PrevPropertyDoesNotReferenceBack { prev } => write!(
                f,
                "The previous property record does not have this record as its next. (prev={})",
                id(*prev)
            ),
            K::NextPropertyDoesNotReferenceBack { next } => write!(
                f,
                "The next property record does not have this record as its previous. (next={})",
                id(*next)
            ),
            K::DynamicValueNotInUse { key, kind, record } => write!(
                f,
                "The {} value record is not in use. (key={}, record={})",
                kind,
                key,
                id(*record)
            ),
            K::DynamicValueEmpty { key, kind, record } => write!(
                f,
                "The {} value record is empty. (key={}, record={})",
                kind,
                key,
                id(*record)
            ),
            K::DynamicValueMultipleOwners { key, kind, record } => write!(
                f,
                "The {} value record is referenced by more than one property. (key={}, record={})",
                kind,
                key,
                id(*record)
            ),
            K::OrphanPropertyChain => write!(
                f,
                "The property record is first in its chain but no node, relationship or graph references it."
            ),
            K::CircularPropertyChain => {
                write!(f, "The property chain loops back through this record.")
            }
            K::NextBlockNotInUse { next } => {
                write!(f, "The next block is not in use. (next={})", id(*next))
            }
            K::RecordNotFullReferencesNext => {
                write!(f, "The block is not full but references a next block.")
            }
            K::InvalidLength { length } => write!(
                f,
                "The block length exceeds the block capacity. (length={})",
                length
            ),
            K::EmptyBlock => write!(f, "The block is empty."),
            K::EmptyNextBlock { next } => {
                write!(f, "The next block is empty. (next={})", id(*next))
            }
            K::SelfReferentialNext => write!(f, "The next block references this block."),
            K::NextBlockMultipleOwners { next } => write!(
                f,
                "The next block is referenced by more than one block or owner. (next={})",
                id(*next)
            ),
            K::OrphanDynamicRecord => {
                write!(f, "The block is in use but no owner or previous block references it.")
            }
            K::DynamicLabelOwnerMismatch { owner } => write!(
                f,
                "The dynamic label record names an owner that does not reference it. (owner={})",
                id(*owner)
            ),
            K::NameBlockNotInUse { record } => write!(
                f,
                "The name block referenced by the token is not in use. (record={})",
                id(*record)
            ),
            K::EmptyName { record } => {
                write!(f, "The token name is empty. (record={})", id(*record))
            }
            K::NameMultipleOwners { record } => write!(
                f,
                "The name block is referenced by more than one token. (record={})",
                id(*record)
            ),
            K::MalformedSchemaRule => write!(f, "The schema rule could not be read."),
            K::UniquenessConstraintNotReferencingBack { index } => write!(
                f,
                "The uniqueness constraint's index rule does not reference back. (index={})",
                id(*index)
            ),
            K::ConstraintIndexRuleNotReferencingBack { constraint } => write!(
                f,
                "The index rule's owning constraint does not reference back. (constraint={})",
                id(*constraint)
            ),
            K::MissingObligation { obligation } => {
                write!(f, "The schema rule has no {}.", obligation)
            }
            K::DuplicateObligation { other } => write!(
                f,
                "The schema rule's obligation is already claimed by another rule. (other={})",
                id(*other)
            ),
            K::DuplicateRuleContent { other } => write!(
                f,
                "The schema rule has the same content as another rule. (other={})",
                id(*other)
            ),
            K::EntityNotInUse { entity } => write!(
                f,
                "The entry refers to an entity that is not in use. (entity={})",
                id(*entity)
            ),
            K::EntityDoesNotHaveExpectedToken { entity, token } => write!(
                f,
                "The entry refers to an entity that does not have the expected token. (entity={}, token={})",
                id(*entity),
                token
            ),
            K::InconsistentCount {
                key,
                expected,
                actual,
            } => write!(
                f,
                "The stored count does not match the observed count. (key={}, expected={}, actual={})",
                key, expected, actual
            ),
            K::InconsistentNumberOfNodeKeys { expected, actual } => write!(
                f,
                "The number of node count keys does not match. (expected={}, actual={})",
                expected, actual
            ),
            K::InconsistentNumberOfRelationshipKeys { expected, actual } => write!(
                f,
                "The number of relationship count keys does not match. (expected={}, actual={})",
                expected, actual
            ),
        }
    }
}
