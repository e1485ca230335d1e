//! In-memory store backend.
//!
//! Reference implementation of [`MemoryStore`]: a process-local backend used
//! in tests and single-process deployments. Ranking quality is intentionally
//! modest — exact cosine scan for vectors, classic BM25 for keywords,
//! breadth-first expansion for the graph — but the contract semantics
//! (optimistic versions, atomic scope batches, contended locks) are exact.

#![allow(clippy::cast_precision_loss)]

use super::traits::{MemoryStore, ScopeLock};
use crate::embedding::cosine_similarity;
use crate::models::{Entity, EntityId, Memory, MemoryId, NodeRef, OwnerScope, Relationship};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

// BM25 constants (Robertson/Spärck Jones defaults).
const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

#[derive(Default)]
struct State {
    memories: HashMap<MemoryId, Memory>,
    entities: HashMap<EntityId, Entity>,
    relationships: HashMap<String, Relationship>,
    /// Embedding dimensionality, fixed per scope by the first non-empty vector.
    dimensions: HashMap<OwnerScope, usize>,
}

/// Process-local [`MemoryStore`] backend.
pub struct InMemoryStore {
    state: Mutex<State>,
    held_locks: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            held_locks: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates the embedding-dimension invariant and the version check for
    /// one write, without applying it.
    fn check_write(state: &State, memory: &Memory) -> Result<()> {
        if !memory.embedding.is_empty() {
            match state.dimensions.get(&memory.owner_scope) {
                Some(&dims) if dims != memory.embedding.len() => {
                    return Err(Error::SchemaViolation(format!(
                        "embedding dimension {} does not match scope dimension {dims}",
                        memory.embedding.len()
                    )));
                },
                _ => {},
            }
        }
        let stored_version = state.memories.get(&memory.id).map(|m| m.version);
        match stored_version {
            None if memory.version != 0 => Err(Error::MergeConflict {
                id: memory.id.to_string(),
                attempts: 1,
            }),
            Some(v) if v != memory.version => Err(Error::MergeConflict {
                id: memory.id.to_string(),
                attempts: 1,
            }),
            _ => Ok(()),
        }
    }

    fn apply_write(state: &mut State, memory: &Memory) -> u64 {
        if !memory.embedding.is_empty() {
            state
                .dimensions
                .entry(memory.owner_scope.clone())
                .or_insert(memory.embedding.len());
        }
        let mut stored = memory.clone();
        stored.version = memory.version + 1;
        let version = stored.version;
        state.memories.insert(stored.id.clone(), stored);
        version
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get(&self, id: &MemoryId) -> Result<Option<Memory>> {
        Ok(self.lock_state().memories.get(id).cloned())
    }

    async fn get_batch(&self, ids: &[MemoryId]) -> Result<Vec<Option<Memory>>> {
        let state = self.lock_state();
        Ok(ids.iter().map(|id| state.memories.get(id).cloned()).collect())
    }

    async fn put(&self, memory: &Memory) -> Result<u64> {
        let mut state = self.lock_state();
        Self::check_write(&state, memory)?;
        Ok(Self::apply_write(&mut state, memory))
    }

    async fn put_batch(&self, memories: &[Memory]) -> Result<()> {
        let mut state = self.lock_state();
        // Validate everything before touching anything: the batch is
        // all-or-nothing.
        for memory in memories {
            Self::check_write(&state, memory)?;
        }
        for memory in memories {
            Self::apply_write(&mut state, memory);
        }
        Ok(())
    }

    async fn list_scope(&self, scope: &OwnerScope) -> Result<Vec<Memory>> {
        let state = self.lock_state();
        let mut out: Vec<Memory> = state
            .memories
            .values()
            .filter(|m| &m.owner_scope == scope)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn list_scopes(&self) -> Result<Vec<OwnerScope>> {
        let state = self.lock_state();
        let mut scopes: Vec<OwnerScope> = state
            .memories
            .values()
            .map(|m| m.owner_scope.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        scopes.sort();
        Ok(scopes)
    }

    async fn find_by_content_hash(&self, scope: &OwnerScope, hash: &str) -> Result<Vec<Memory>> {
        let state = self.lock_state();
        let mut out: Vec<Memory> = state
            .memories
            .values()
            .filter(|m| &m.owner_scope == scope && m.content_hash == hash)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn vector_search(
        &self,
        scope: &OwnerScope,
        embedding: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<(MemoryId, f32)>> {
        let state = self.lock_state();
        let mut scored: Vec<(MemoryId, f32)> = state
            .memories
            .values()
            .filter(|m| &m.owner_scope == scope && m.tier.is_searchable() && !m.embedding.is_empty())
            .map(|m| (m.id.clone(), cosine_similarity(embedding, &m.embedding)))
            .filter(|(_, score)| *score >= min_similarity)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn lexical_search(
        &self,
        scope: &OwnerScope,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(MemoryId, f32)>> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.lock_state();
        let docs: Vec<(&MemoryId, Vec<String>)> = state
            .memories
            .values()
            .filter(|m| &m.owner_scope == scope && m.tier.is_searchable())
            .map(|m| (&m.id, tokenize(&m.content)))
            .collect();
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let doc_count = docs.len() as f32;
        let avg_len = docs.iter().map(|(_, t)| t.len()).sum::<usize>() as f32 / doc_count;

        // Document frequency per query term.
        let mut df: HashMap<&str, f32> = HashMap::new();
        for term in &query_terms {
            let n = docs
                .iter()
                .filter(|(_, tokens)| tokens.iter().any(|t| t == term))
                .count() as f32;
            df.insert(term.as_str(), n);
        }

        let mut scored: Vec<(MemoryId, f32)> = docs
            .iter()
            .filter_map(|(id, tokens)| {
                let doc_len = tokens.len() as f32;
                let mut score = 0.0f32;
                for term in &query_terms {
                    let tf = tokens.iter().filter(|t| *t == term).count() as f32;
                    if tf == 0.0 {
                        continue;
                    }
                    let n = df.get(term.as_str()).copied().unwrap_or(0.0);
                    let idf = ((doc_count - n + 0.5) / (n + 0.5) + 1.0).ln();
                    let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_len.max(1.0));
                    score += idf * tf * (BM25_K1 + 1.0) / (tf + norm);
                }
                (score > 0.0).then(|| ((*id).clone(), score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn put_entity(&self, entity: &Entity) -> Result<()> {
        self.lock_state()
            .entities
            .insert(entity.id.clone(), entity.clone());
        Ok(())
    }

    async fn find_entities(&self, scope: &OwnerScope, names: &[String]) -> Result<Vec<Entity>> {
        let lowered: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let state = self.lock_state();
        let mut out: Vec<Entity> = state
            .entities
            .values()
            .filter(|e| &e.owner_scope == scope && lowered.contains(&e.name.to_lowercase()))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(out)
    }

    async fn put_relationship(&self, relationship: &Relationship) -> Result<()> {
        self.lock_state()
            .relationships
            .insert(relationship.id.as_str().to_string(), relationship.clone());
        Ok(())
    }

    async fn relationships_for_memory(
        &self,
        id: &MemoryId,
        active_only: bool,
    ) -> Result<Vec<Relationship>> {
        let state = self.lock_state();
        let mut out: Vec<Relationship> = state
            .relationships
            .values()
            .filter(|r| {
                (r.from.as_memory() == Some(id) || r.to.as_memory() == Some(id))
                    && (!active_only || r.is_active)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(out)
    }

    async fn graph_traverse(
        &self,
        scope: &OwnerScope,
        start: &[EntityId],
        max_hops: u32,
        top_k: usize,
    ) -> Result<Vec<(MemoryId, f32)>> {
        let state = self.lock_state();

        // Adjacency over active edges in this scope. Entity-entity edges are
        // walked in both directions; entity-memory edges terminate a path.
        let edges: Vec<&Relationship> = state
            .relationships
            .values()
            .filter(|r| &r.owner_scope == scope && r.is_active)
            .collect();

        let mut best: HashMap<MemoryId, f32> = HashMap::new();
        let mut visited: HashMap<EntityId, u32> = HashMap::new();
        let mut queue: VecDeque<(EntityId, u32, f32)> = start
            .iter()
            .map(|id| (id.clone(), 0, 1.0f32))
            .collect();

        while let Some((entity, depth, path_weight)) = queue.pop_front() {
            if let Some(&seen_depth) = visited.get(&entity)
                && seen_depth <= depth
            {
                continue;
            }
            visited.insert(entity.clone(), depth);
            if depth >= max_hops {
                continue;
            }

            for edge in &edges {
                let (near, far) = (&edge.from, &edge.to);
                let next = if near.as_entity() == Some(&entity) {
                    far
                } else if far.as_entity() == Some(&entity) {
                    near
                } else {
                    continue;
                };
                let weight = path_weight * edge.weight;
                match next {
                    NodeRef::Memory(memory_id) => {
                        if state
                            .memories
                            .get(memory_id)
                            .is_some_and(|m| m.tier.is_searchable())
                        {
                            let score = weight / (depth + 1) as f32;
                            let entry = best.entry(memory_id.clone()).or_insert(0.0);
                            if score > *entry {
                                *entry = score;
                            }
                        }
                    },
                    NodeRef::Entity(next_entity) => {
                        queue.push_back((next_entity.clone(), depth + 1, weight));
                    },
                }
            }
        }

        let mut scored: Vec<(MemoryId, f32)> = best.into_iter().collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn acquire_scope_lock(&self, scope: &OwnerScope) -> Result<ScopeLock> {
        let mut held = self
            .held_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !held.insert(scope.as_str().to_string()) {
            return Err(Error::LockContended {
                scope: scope.as_str().to_string(),
            });
        }
        drop(held);

        let registry = Arc::clone(&self.held_locks);
        let key = scope.as_str().to_string();
        Ok(ScopeLock::new(scope.clone(), move || {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::current_timestamp;
    use crate::models::{MemoryTier, RelationKind};

    fn test_memory(id: &str, scope: &str, content: &str) -> Memory {
        let now = current_timestamp();
        Memory {
            id: MemoryId::new(id),
            owner_scope: OwnerScope::new(scope),
            content: content.to_string(),
            embedding: Vec::new(),
            tier: MemoryTier::Working,
            importance: 0.5,
            decay_score: 0.5,
            content_hash: format!("{id}-hash"),
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

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = InMemoryStore::new();
        let memory = test_memory("m1", "s1", "hello world");

        let version = store.put(&memory).await.unwrap();
        assert_eq!(version, 1);

        let fetched = store.get(&memory.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello world");
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let store = InMemoryStore::new();
        let memory = test_memory("m1", "s1", "v0");
        store.put(&memory).await.unwrap();

        // Writing with the original version 0 again is stale: the stored
        // record is at version 1.
        let result = store.put(&memory).await;
        assert!(matches!(result, Err(Error::MergeConflict { .. })));

        let mut fresh = store.get(&memory.id).await.unwrap().unwrap();
        fresh.content = "v1".to_string();
        assert_eq!(store.put(&fresh).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_put_batch_is_atomic() {
        let store = InMemoryStore::new();
        let good = test_memory("m1", "s1", "good");
        let mut stale = test_memory("m2", "s1", "stale");
        store.put(&stale).await.unwrap();
        stale.content = "conflicting".to_string(); // still version 0, now stale

        let result = store.put_batch(&[good.clone(), stale]).await;
        assert!(matches!(result, Err(Error::MergeConflict { .. })));

        // The good record must not have been committed.
        assert!(store.get(&good.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dimension_invariant_per_scope() {
        let store = InMemoryStore::new();
        let mut first = test_memory("m1", "s1", "first");
        first.embedding = vec![0.1, 0.2, 0.3];
        store.put(&first).await.unwrap();

        let mut wrong = test_memory("m2", "s1", "wrong dims");
        wrong.embedding = vec![0.1, 0.2];
        assert!(matches!(
            store.put(&wrong).await,
            Err(Error::SchemaViolation(_))
        ));

        // A different scope fixes its own dimensionality independently.
        let mut other_scope = test_memory("m3", "s2", "other");
        other_scope.embedding = vec![0.1, 0.2];
        store.put(&other_scope).await.unwrap();
    }

    #[tokio::test]
    async fn test_vector_search_excludes_archived() {
        let store = InMemoryStore::new();
        let mut active = test_memory("m1", "s1", "active");
        active.embedding = vec![1.0, 0.0];
        store.put(&active).await.unwrap();

        let mut archived = test_memory("m2", "s1", "archived");
        archived.embedding = vec![1.0, 0.0];
        archived.tier = MemoryTier::Archived;
        store.put(&archived).await.unwrap();

        let hits = store
            .vector_search(&OwnerScope::new("s1"), &[1.0, 0.0], 10, 0.5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.as_str(), "m1");
        assert!(hits[0].1 > 0.99);
    }

    #[tokio::test]
    async fn test_lexical_search_ranks_by_relevance() {
        let store = InMemoryStore::new();
        store
            .put(&test_memory("m1", "s1", "postgres postgres postgres tuning"))
            .await
            .unwrap();
        store
            .put(&test_memory("m2", "s1", "postgres appears once here"))
            .await
            .unwrap();
        store
            .put(&test_memory("m3", "s1", "completely unrelated content"))
            .await
            .unwrap();

        let hits = store
            .lexical_search(&OwnerScope::new("s1"), "postgres", 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.as_str(), "m1");
        assert!(hits[0].1 > hits[1].1);
    }

    #[tokio::test]
    async fn test_graph_traverse_bounded_hops() {
        let store = InMemoryStore::new();
        let scope = OwnerScope::new("s1");
        store.put(&test_memory("m1", "s1", "near")).await.unwrap();
        store.put(&test_memory("m2", "s1", "far")).await.unwrap();

        let a = EntityId::new("e-a");
        let b = EntityId::new("e-b");
        // a → m1 (one hop), a → b → m2 (two hops).
        store
            .put_relationship(&Relationship::new(
                scope.clone(),
                NodeRef::Entity(a.clone()),
                NodeRef::Memory(MemoryId::new("m1")),
                RelationKind::MentionedIn,
                1.0,
            ))
            .await
            .unwrap();
        store
            .put_relationship(&Relationship::new(
                scope.clone(),
                NodeRef::Entity(a.clone()),
                NodeRef::Entity(b.clone()),
                RelationKind::RelatesTo,
                1.0,
            ))
            .await
            .unwrap();
        store
            .put_relationship(&Relationship::new(
                scope.clone(),
                NodeRef::Entity(b),
                NodeRef::Memory(MemoryId::new("m2")),
                RelationKind::MentionedIn,
                1.0,
            ))
            .await
            .unwrap();

        let one_hop = store
            .graph_traverse(&scope, &[a.clone()], 1, 10)
            .await
            .unwrap();
        assert_eq!(one_hop.len(), 1);
        assert_eq!(one_hop[0].0.as_str(), "m1");

        let two_hops = store.graph_traverse(&scope, &[a], 2, 10).await.unwrap();
        assert_eq!(two_hops.len(), 2);
        // The closer memory scores higher.
        assert_eq!(two_hops[0].0.as_str(), "m1");
    }

    #[tokio::test]
    async fn test_inactive_edges_invisible_to_traversal() {
        let store = InMemoryStore::new();
        let scope = OwnerScope::new("s1");
        store.put(&test_memory("m1", "s1", "target")).await.unwrap();

        let entity = EntityId::new("e-a");
        let mut edge = Relationship::new(
            scope.clone(),
            NodeRef::Entity(entity.clone()),
            NodeRef::Memory(MemoryId::new("m1")),
            RelationKind::MentionedIn,
            1.0,
        );
        edge.invalidate(current_timestamp());
        store.put_relationship(&edge).await.unwrap();

        let hits = store.graph_traverse(&scope, &[entity], 2, 10).await.unwrap();
        assert!(hits.is_empty());

        // The audit path still sees the closed edge.
        let history = store
            .relationships_for_memory(&MemoryId::new("m1"), false)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        let active = store
            .relationships_for_memory(&MemoryId::new("m1"), true)
            .await
            .unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_scope_lock_contention_and_release() {
        let store = InMemoryStore::new();
        let scope = OwnerScope::new("s1");

        let lock = store.acquire_scope_lock(&scope).await.unwrap();
        assert!(matches!(
            store.acquire_scope_lock(&scope).await,
            Err(Error::LockContended { .. })
        ));

        // Another scope locks independently.
        let other = store.acquire_scope_lock(&OwnerScope::new("s2")).await;
        assert!(other.is_ok());

        drop(lock);
        assert!(store.acquire_scope_lock(&scope).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_scopes() {
        let store = InMemoryStore::new();
        store.put(&test_memory("m1", "alpha", "x")).await.unwrap();
        store.put(&test_memory("m2", "beta", "y")).await.unwrap();
        store.put(&test_memory("m3", "alpha", "z")).await.unwrap();

        let scopes = store.list_scopes().await.unwrap();
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].as_str(), "alpha");
        assert_eq!(scopes[1].as_str(), "beta");
    }
}
