//! Memory store adapter trait.
//!
//! The adapter is the single seam between the engine and whatever actually
//! persists records and executes vector, lexical, and graph queries. The
//! engine assumes nothing about the backend beyond this contract.
//!
//! # Implementor Notes
//!
//! - Methods take `&self` so backends can be shared via `Arc<dyn MemoryStore>`;
//!   use interior mutability for mutable state.
//! - `put` enforces optimistic versioning: a write whose `version` does not
//!   match the stored record must fail with [`Error::MergeConflict`] so the
//!   caller can re-read and retry.
//! - `put_batch` must be all-or-nothing within one owner scope. Consolidation
//!   relies on it to never leave a candidate set half-merged.
//! - `vector_search` and `lexical_search` rank non-archived memories only;
//!   archived content is reachable through `get`/`list_scope` (audit path).
//! - Failures that may succeed on retry should surface as
//!   [`Error::TransientStore`].

use crate::Result;
use crate::models::{Entity, EntityId, Memory, MemoryId, OwnerScope, Relationship};
use async_trait::async_trait;

/// Releasable handle to an exclusive per-scope lock.
///
/// The lock is released when the handle is dropped. Holding it guarantees no
/// other consolidation run is active for the same owner scope; nothing else
/// in the engine takes exclusive locks.
pub struct ScopeLock {
    scope: OwnerScope,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ScopeLock {
    /// Creates a lock handle that runs `release` when dropped.
    #[must_use]
    pub fn new(scope: OwnerScope, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            scope,
            release: Some(Box::new(release)),
        }
    }

    /// The scope this handle locks.
    #[must_use]
    pub const fn scope(&self) -> &OwnerScope {
        &self.scope
    }
}

impl Drop for ScopeLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for ScopeLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeLock").field("scope", &self.scope).finish()
    }
}

/// Trait for memory store backends.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Retrieves a memory by ID.
    async fn get(&self, id: &MemoryId) -> Result<Option<Memory>>;

    /// Retrieves multiple memories in one batch query.
    ///
    /// Returns results in input order, `None` for missing IDs. Backends
    /// should override the default loop with a real batch query.
    async fn get_batch(&self, ids: &[MemoryId]) -> Result<Vec<Option<Memory>>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.get(id).await?);
        }
        Ok(out)
    }

    /// Inserts or updates a memory with an optimistic version check.
    ///
    /// Inserts require `version == 0`. Updates require `version` to match the
    /// stored record; the record is persisted with `version + 1`, which is
    /// returned.
    ///
    /// # Errors
    ///
    /// [`Error::MergeConflict`] on a stale version.
    async fn put(&self, memory: &Memory) -> Result<u64>;

    /// Writes a set of memories atomically within one owner scope.
    ///
    /// Either every record commits (each with its version bumped) or none
    /// does.
    async fn put_batch(&self, memories: &[Memory]) -> Result<()>;

    /// Lists every memory in a scope, all tiers included.
    async fn list_scope(&self, scope: &OwnerScope) -> Result<Vec<Memory>>;

    /// Lists every owner scope with at least one memory.
    async fn list_scopes(&self) -> Result<Vec<OwnerScope>>;

    /// Finds memories in a scope by exact content hash.
    async fn find_by_content_hash(&self, scope: &OwnerScope, hash: &str) -> Result<Vec<Memory>>;

    /// Top-K cosine-similarity search over non-archived memories in a scope.
    ///
    /// Returns `(id, similarity)` pairs with similarity in `[0, 1]`, best
    /// first, filtered to `similarity >= min_similarity`.
    async fn vector_search(
        &self,
        scope: &OwnerScope,
        embedding: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<(MemoryId, f32)>>;

    /// Top-K keyword-relevance search over non-archived memories in a scope.
    async fn lexical_search(
        &self,
        scope: &OwnerScope,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(MemoryId, f32)>>;

    /// Inserts or updates an entity.
    async fn put_entity(&self, entity: &Entity) -> Result<()>;

    /// Finds entities in a scope by name (case-insensitive exact match).
    async fn find_entities(&self, scope: &OwnerScope, names: &[String]) -> Result<Vec<Entity>>;

    /// Inserts or updates a relationship edge.
    async fn put_relationship(&self, relationship: &Relationship) -> Result<()>;

    /// Lists edges that touch a memory.
    ///
    /// With `active_only`, soft-invalidated edges are excluded; audit paths
    /// pass `false` for full history.
    async fn relationships_for_memory(
        &self,
        id: &MemoryId,
        active_only: bool,
    ) -> Result<Vec<Relationship>>;

    /// Bounded-hop traversal from starting entities to associated memories.
    ///
    /// Follows active edges only, up to `max_hops`, and returns at most
    /// `top_k` `(memory_id, association_score)` pairs, best first.
    async fn graph_traverse(
        &self,
        scope: &OwnerScope,
        start: &[EntityId],
        max_hops: u32,
        top_k: usize,
    ) -> Result<Vec<(MemoryId, f32)>>;

    /// Acquires the exclusive consolidation lock for a scope.
    ///
    /// # Errors
    ///
    /// [`Error::LockContended`] when the lock is already held; callers skip
    /// the cycle rather than block.
    async fn acquire_scope_lock(&self, scope: &OwnerScope) -> Result<ScopeLock>;
}
