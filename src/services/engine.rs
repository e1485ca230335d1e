//! Memory engine facade.
//!
//! The one type callers hold. Wires the store adapter, collaborators, and
//! the three core services together and exposes the exported operations:
//! `add_memory`, `search`, `get_memory`, `run_consolidation`, and `sweep`.
//! Transport layers (CLI, REST, RPC) sit on top of this and are out of
//! scope here.

use super::consolidation::ConsolidationEngine;
use super::rerank::Reranker;
use super::retrieval::HybridRetriever;
use crate::config::EngineConfig;
use crate::current_timestamp;
use crate::embedding::Embedder;
use crate::extraction::EntityExtractor;
use crate::lifecycle::TierManager;
use crate::models::{
    AddMemoryRequest, AddMemoryResult, ConsolidationReport, Entity, Memory, MemoryId, MemoryTier,
    NodeRef, OwnerScope, RelationKind, Relationship, SearchFilter, SearchResult, SweepReport,
};
use crate::services::dedup::ContentHasher;
use crate::storage::{InMemoryStore, MemoryStore, update_with_retry};
use crate::summarize::Summarizer;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Bounded attempts when reconciling read-path access bumps with concurrent
/// lifecycle writes.
const ACCESS_WRITE_ATTEMPTS: u32 = 3;

/// Facade over the tiered memory engine.
pub struct MemoryEngine {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    extractor: Option<Arc<dyn EntityExtractor>>,
    retriever: HybridRetriever,
    tiers: TierManager,
    consolidation: ConsolidationEngine,
    config: EngineConfig,
}

impl MemoryEngine {
    /// Creates an engine over injected collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn Summarizer>,
        config: EngineConfig,
    ) -> Self {
        let retriever = HybridRetriever::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            config.retrieval.clone(),
        );
        let tiers = TierManager::new(Arc::clone(&store), config.decay, config.tiers);
        let consolidation = ConsolidationEngine::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            summarizer,
            config.consolidation,
        );
        Self {
            store,
            embedder,
            extractor: None,
            retriever,
            tiers,
            consolidation,
            config,
        }
    }

    /// Creates a fully in-process engine: in-memory store, deterministic
    /// hash embedder, concatenating summarizer, keyword entity extractor.
    #[must_use]
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(crate::embedding::HashEmbedder::new()),
            Arc::new(crate::summarize::ConcatSummarizer::new()),
            config,
        )
        .with_extractor(Arc::new(crate::extraction::KeywordExtractor::new()))
    }

    /// Attaches an entity extractor, enabling graph enrichment at ingestion
    /// and the graph retrieval stage.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn EntityExtractor>) -> Self {
        self.retriever.set_extractor(Arc::clone(&extractor));
        self.extractor = Some(extractor);
        self
    }

    /// Attaches a reranker for retrieval's bounded final pass.
    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.retriever.set_reranker(reranker);
        self
    }

    /// Ingests a new memory.
    ///
    /// The memory starts in `Working` with a zero access count. A content-
    /// hash collision with an existing non-archived memory in the same scope
    /// is reported via `duplicate_of` and resolved by the next consolidation
    /// run — never silently duplicated, never silently dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] on empty content.
    /// - [`Error::SchemaViolation`] on out-of-range `importance` or
    ///   provenance confidence; nothing is persisted.
    #[instrument(
        name = "engram.memory.add",
        skip(self, request),
        fields(scope = %scope, component = "memory", operation = "add")
    )]
    pub async fn add_memory(
        &self,
        scope: &OwnerScope,
        request: AddMemoryRequest,
    ) -> Result<AddMemoryResult> {
        let start = Instant::now();
        if request.content.trim().is_empty() {
            return Err(Error::InvalidInput("memory content is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&request.importance) {
            return Err(Error::SchemaViolation(format!(
                "importance {} outside [0, 1]",
                request.importance
            )));
        }
        for provenance in &request.provenance {
            if !(0.0..=1.0).contains(&provenance.confidence) {
                return Err(Error::SchemaViolation(format!(
                    "provenance confidence {} outside [0, 1]",
                    provenance.confidence
                )));
            }
        }

        let content_hash = ContentHasher::hash(&request.content);
        let duplicate_of = self
            .store
            .find_by_content_hash(scope, &content_hash)
            .await?
            .into_iter()
            .find(|m| m.tier != MemoryTier::Archived)
            .map(|m| m.id);
        if let Some(existing) = &duplicate_of {
            debug!(
                existing = %existing,
                "content hash collision, routing pair to consolidation"
            );
            metrics::counter!("memory_duplicates_detected_total").increment(1);
        }

        // Embedding is bounded and best-effort: a memory without a vector is
        // still lexically and graph retrievable.
        let deadline = Duration::from_millis(self.config.retrieval.stage_timeout_ms);
        let embedding = match tokio::time::timeout(deadline, self.embedder.embed(&request.content))
            .await
        {
            Ok(Ok(embedding)) => embedding,
            Ok(Err(e)) => {
                warn!(error = %e, "embedding failed at ingestion, storing without vector");
                Vec::new()
            },
            Err(_) => {
                warn!("embedding timed out at ingestion, storing without vector");
                Vec::new()
            },
        };

        let now = current_timestamp();
        let mut tags = request.tags;
        tags.sort();
        tags.dedup();

        let memory = Memory {
            id: MemoryId::generate(),
            owner_scope: scope.clone(),
            content: request.content,
            embedding,
            tier: MemoryTier::Working,
            importance: request.importance,
            decay_score: request.importance,
            content_hash,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            tags,
            provenance: request.provenance,
            superseded_by: None,
            archived_at: None,
            low_score_streak: 0,
            version: 0,
        };
        self.store.put(&memory).await?;

        if let Err(e) = self.link_entities(scope, &memory).await {
            warn!(error = %e, "entity enrichment failed, memory stored without edges");
        }

        metrics::counter!("memory_operations_total", "operation" => "add").increment(1);
        metrics::histogram!("memory_operation_duration_ms", "operation" => "add")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        Ok(AddMemoryResult {
            id: memory.id,
            duplicate_of,
        })
    }

    /// Extracts entities from a memory's content and records
    /// `MentionedIn` edges. Entities are shared: an existing entity with the
    /// same name is reused, never duplicated.
    async fn link_entities(&self, scope: &OwnerScope, memory: &Memory) -> Result<()> {
        let Some(extractor) = &self.extractor else {
            return Ok(());
        };
        let extracted = extractor.extract(&memory.content).await?;
        for found in extracted {
            let existing = self
                .store
                .find_entities(scope, std::slice::from_ref(&found.name))
                .await?;
            let entity = match existing.into_iter().next() {
                Some(entity) => entity,
                None => {
                    let entity = Entity::new(scope.clone(), found.name, found.kind);
                    self.store.put_entity(&entity).await?;
                    entity
                },
            };
            self.store
                .put_relationship(&Relationship::new(
                    scope.clone(),
                    NodeRef::Entity(entity.id),
                    NodeRef::Memory(memory.id.clone()),
                    RelationKind::MentionedIn,
                    1.0,
                ))
                .await?;
        }
        Ok(())
    }

    /// Hybrid search over a scope.
    ///
    /// Always returns a best-effort ranked list (possibly empty) with
    /// per-stage metadata; see [`HybridRetriever::search`] for the failure
    /// contract. Returned memories are reinforced: their access time and
    /// counter are bumped, resetting decay.
    #[instrument(
        name = "engram.memory.search",
        skip(self, query, filter),
        fields(scope = %scope, component = "memory", operation = "search")
    )]
    pub async fn search(
        &self,
        scope: &OwnerScope,
        query: &str,
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<SearchResult> {
        let mut result = self.retriever.search(scope, query, filter, top_k).await?;

        let now = current_timestamp();
        for hit in &mut result.hits {
            match self.reinforce(&hit.memory.id, now).await {
                Ok(Some(fresh)) => hit.memory = fresh,
                Ok(None) => {},
                Err(e) => warn!(memory_id = %hit.memory.id, error = %e, "access bump failed"),
            }
        }

        metrics::counter!("memory_operations_total", "operation" => "search").increment(1);
        Ok(result)
    }

    /// Fetches a memory by id, reinforcing it on hit.
    ///
    /// Archived memories are returned too — direct reads are the audit path.
    pub async fn get_memory(&self, id: &MemoryId) -> Result<Option<Memory>> {
        let now = current_timestamp();
        self.reinforce(id, now).await
    }

    /// Bumps access tracking on a record, reconciling with concurrent
    /// lifecycle writes by re-read-and-retry.
    async fn reinforce(&self, id: &MemoryId, now: u64) -> Result<Option<Memory>> {
        update_with_retry(self.store.as_ref(), id, ACCESS_WRITE_ATTEMPTS, move |m| {
            m.record_access(now);
        })
        .await
    }

    /// Runs one consolidation batch for a scope.
    ///
    /// # Errors
    ///
    /// [`Error::LockContended`] when another run holds the scope lock; the
    /// caller should skip, not block.
    pub async fn run_consolidation(&self, scope: &OwnerScope) -> Result<ConsolidationReport> {
        self.consolidation.consolidate(scope).await
    }

    /// Runs one decay/tier sweep for a scope.
    pub async fn sweep(&self, scope: &OwnerScope) -> Result<SweepReport> {
        self.tiers.sweep(scope).await
    }

    /// Lists every owner scope known to the store.
    pub async fn list_scopes(&self) -> Result<Vec<OwnerScope>> {
        self.store.list_scopes().await
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
