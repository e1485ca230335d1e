//! Memory records and identifiers.

use super::MemoryTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a memory ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new time-ordered unique ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Partition key isolating one logical memory space.
///
/// All locking and data access is scoped by owner; there is no cross-scope
/// coordination anywhere in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerScope(String);

impl OwnerScope {
    /// Creates an owner scope.
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// Returns the scope as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OwnerScope {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a memory came from and how much the source is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source identifier (session id, tool name, URL, file path).
    pub source: String,
    /// Source confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Provenance {
    /// Creates a provenance record.
    #[must_use]
    pub fn new(source: impl Into<String>, confidence: f32) -> Self {
        Self {
            source: source.into(),
            confidence,
        }
    }
}

/// The atomic unit of stored information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier.
    pub id: MemoryId,
    /// Partition this memory belongs to.
    pub owner_scope: OwnerScope,
    /// The memory content.
    pub content: String,
    /// Embedding vector. Empty when no embedder was available at ingestion;
    /// dimensionality is fixed per owner scope by the first non-empty vector.
    pub embedding: Vec<f32>,
    /// Current lifecycle tier.
    pub tier: MemoryTier,
    /// Declared importance in `[0, 1]`.
    pub importance: f32,
    /// Freshness score recomputed each lifecycle sweep.
    pub decay_score: f32,
    /// SHA-256 digest of normalized content, hex-encoded.
    pub content_hash: String,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Last read-path access (Unix epoch seconds). Drives decay.
    pub last_accessed_at: u64,
    /// Monotonic access counter.
    pub access_count: u64,
    /// Tags, deduplicated and sorted.
    pub tags: Vec<String>,
    /// Provenance records. Concatenated, never discarded, on merge.
    pub provenance: Vec<Provenance>,
    /// Canonical memory this one was merged into, when archived as duplicate.
    pub superseded_by: Option<MemoryId>,
    /// When the memory was archived (UTC).
    pub archived_at: Option<DateTime<Utc>>,
    /// Consecutive sweeps the decay score sat below the archive threshold.
    pub low_score_streak: u32,
    /// Optimistic concurrency version, bumped on every persisted write.
    pub version: u64,
}

impl Memory {
    /// Age in fractional days measured from `created_at`.
    ///
    /// Clock skew (a creation timestamp in the future) clamps to 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn age_days(&self, now: u64) -> f32 {
        now.saturating_sub(self.created_at) as f32 / 86_400.0
    }

    /// Age in fractional days measured from `last_accessed_at`.
    ///
    /// Recency of use, not of creation, drives survival; clock skew clamps
    /// to 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn idle_days(&self, now: u64) -> f32 {
        now.saturating_sub(self.last_accessed_at) as f32 / 86_400.0
    }

    /// Records a read-path access: resets the effective decay age and bumps
    /// the counter. This is the reinforcement mechanism.
    pub fn record_access(&mut self, now: u64) {
        self.last_accessed_at = self.last_accessed_at.max(now);
        self.access_count = self.access_count.saturating_add(1);
    }
}

/// Request to ingest a new memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddMemoryRequest {
    /// The content to remember.
    pub content: String,
    /// Declared importance in `[0, 1]`.
    pub importance: f32,
    /// Optional tags.
    pub tags: Vec<String>,
    /// Optional provenance records.
    pub provenance: Vec<Provenance>,
}

/// Outcome of an ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemoryResult {
    /// The stored memory's id.
    pub id: MemoryId,
    /// An existing memory in the same scope with an identical content hash.
    ///
    /// The new memory is still stored; the pair is routed to the next
    /// consolidation run rather than silently coexisting.
    pub duplicate_of: Option<MemoryId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::current_timestamp;

    fn sample_memory(id: &str, scope: &str) -> Memory {
        let now = current_timestamp();
        Memory {
            id: MemoryId::new(id),
            owner_scope: OwnerScope::new(scope),
            content: "sample".to_string(),
            embedding: Vec::new(),
            tier: MemoryTier::Working,
            importance: 0.5,
            decay_score: 0.5,
            content_hash: "0".repeat(64),
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            tags: Vec::new(),
            provenance: Vec::new(),
            superseded_by: None,
            archived_at: None,
            low_score_streak: 0,
            version: 0,
        }
    }

    #[test]
    fn test_generated_ids_are_unique_and_ordered() {
        let a = MemoryId::generate();
        let b = MemoryId::generate();
        assert_ne!(a, b);
        // UUIDv7 is time-ordered, so lexicographic order follows creation.
        assert!(a < b);
    }

    #[test]
    fn test_age_clamps_clock_skew() {
        let mut memory = sample_memory("m1", "s1");
        memory.created_at = current_timestamp() + 3600;
        memory.last_accessed_at = memory.created_at;
        assert!(memory.age_days(current_timestamp()).abs() < f32::EPSILON);
        assert!(memory.idle_days(current_timestamp()).abs() < f32::EPSILON);
    }

    #[test]
    fn test_record_access_reinforces() {
        let mut memory = sample_memory("m1", "s1");
        memory.last_accessed_at = 1000;
        memory.record_access(2000);
        assert_eq!(memory.last_accessed_at, 2000);
        assert_eq!(memory.access_count, 1);

        // A stale clock never moves last_accessed_at backwards.
        memory.record_access(1500);
        assert_eq!(memory.last_accessed_at, 2000);
        assert_eq!(memory.access_count, 2);
    }
}
