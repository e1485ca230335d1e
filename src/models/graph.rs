//! Knowledge-graph types: entities and typed, weighted relationships.
//!
//! Entities are named concepts extracted from memory content. Memories
//! reference entities weakly through relationships; archiving or deleting a
//! memory never deletes an entity. Edges carry valid-time ranges and are
//! soft-invalidated (closed) rather than deleted.

use super::memory::{MemoryId, OwnerScope};
use super::temporal::ValidTimeRange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a graph entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an entity ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique entity ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ent_{}", uuid::Uuid::now_v7()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a relationship edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(String);

impl RelationshipId {
    /// Creates a relationship ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique relationship ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("rel_{}", uuid::Uuid::now_v7()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of a graph entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Named individual.
    Person,
    /// Company, team, or group.
    Organization,
    /// Abstract idea, pattern, or methodology.
    Concept,
    /// Tool, framework, language, or library.
    Technology,
    /// Code file, document, or artifact.
    File,
}

impl EntityKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Concept => "concept",
            Self::Technology => "technology",
            Self::File => "file",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named concept extracted from memory content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Partition this entity belongs to.
    pub owner_scope: OwnerScope,
    /// Canonical name.
    pub name: String,
    /// Entity category.
    pub kind: EntityKind,
    /// Optional embedding of the entity name/description.
    pub embedding: Vec<f32>,
}

impl Entity {
    /// Creates a new entity with a generated ID.
    #[must_use]
    pub fn new(owner_scope: OwnerScope, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: EntityId::generate(),
            owner_scope,
            name: name.into(),
            kind,
            embedding: Vec::new(),
        }
    }
}

/// Either end of a relationship edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum NodeRef {
    /// A graph entity.
    Entity(EntityId),
    /// A memory record.
    Memory(MemoryId),
}

impl NodeRef {
    /// Returns the referenced memory ID, if this end is a memory.
    #[must_use]
    pub const fn as_memory(&self) -> Option<&MemoryId> {
        match self {
            Self::Memory(id) => Some(id),
            Self::Entity(_) => None,
        }
    }

    /// Returns the referenced entity ID, if this end is an entity.
    #[must_use]
    pub const fn as_entity(&self) -> Option<&EntityId> {
        match self {
            Self::Entity(id) => Some(id),
            Self::Memory(_) => None,
        }
    }
}

/// Type of a relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Entity → Memory provenance link.
    MentionedIn,
    /// General association between entities.
    RelatesTo,
    /// Dependency between entities.
    Uses,
    /// Composition between entities.
    PartOf,
    /// Versioning: the source replaces the target.
    Supersedes,
    /// Contradiction between entities.
    ConflictsWith,
}

impl RelationKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MentionedIn => "mentioned_in",
            Self::RelatesTo => "relates_to",
            Self::Uses => "uses",
            Self::PartOf => "part_of",
            Self::Supersedes => "supersedes",
            Self::ConflictsWith => "conflicts_with",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, weighted, directed edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier.
    pub id: RelationshipId,
    /// Partition this edge belongs to.
    pub owner_scope: OwnerScope,
    /// Source node.
    pub from: NodeRef,
    /// Target node.
    pub to: NodeRef,
    /// Edge type.
    pub kind: RelationKind,
    /// Edge weight in `[0, 1]`.
    pub weight: f32,
    /// When this edge is/was valid.
    pub valid: ValidTimeRange,
    /// Whether the edge participates in default queries.
    pub is_active: bool,
}

impl Relationship {
    /// Creates an active, unbounded-validity edge with a generated ID.
    #[must_use]
    pub fn new(
        owner_scope: OwnerScope,
        from: NodeRef,
        to: NodeRef,
        kind: RelationKind,
        weight: f32,
    ) -> Self {
        Self {
            id: RelationshipId::generate(),
            owner_scope,
            from,
            to,
            kind,
            weight,
            valid: ValidTimeRange::unbounded(),
            is_active: true,
        }
    }

    /// Soft-invalidates the edge: closes its valid time and removes it from
    /// default queries. History stays intact.
    pub const fn invalidate(&mut self, at: u64) {
        self.valid = self.valid.close_at(at);
        self.is_active = false;
    }
}
