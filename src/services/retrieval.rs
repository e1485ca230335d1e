//! Hybrid retrieval pipeline.
//!
//! Six fixed steps: three concurrent retrieval stages (vector, lexical,
//! graph), then a sequential tail (metadata filter, fusion, optional rerank).
//!
//! Each stage is bounded and independently failure-tolerant: a timed-out or
//! errored stage contributes nothing and is flagged in the explanation, and
//! the request succeeds on whatever signals remain. Only when no stage at
//! all produces a signal does the call surface
//! [`Error::RetrievalUnavailable`].
//!
//! The metadata filter runs *after* retrieval, not before, so stage results
//! stay reusable across filter variants; it applies the caller's filter plus
//! the default `tier != Archived` visibility rule, which also suppresses
//! soon-to-be-archived duplicates during a consolidation window.

use super::fusion::{FusionEngine, StageCandidates};
use super::rerank::Reranker;
use crate::config::RetrievalConfig;
use crate::current_timestamp;
use crate::embedding::Embedder;
use crate::extraction::EntityExtractor;
use crate::models::{
    MemoryId, OwnerScope, RetrievalExplanation, SearchFilter, SearchHit, SearchResult, StageKind,
    StageReport, StageStatus,
};
use crate::storage::MemoryStore;
use crate::{Error, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// One stage's outcome before fusion.
struct StageOutcome {
    kind: StageKind,
    status: StageStatus,
    hits: Vec<(MemoryId, f32)>,
    duration_ms: u64,
}

impl StageOutcome {
    fn report(&self) -> StageReport {
        StageReport {
            kind: self.kind,
            status: self.status.clone(),
            candidates: self.hits.len(),
            duration_ms: self.duration_ms,
        }
    }
}

/// Orchestrates staged hybrid search over a [`MemoryStore`].
pub struct HybridRetriever {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    extractor: Option<Arc<dyn EntityExtractor>>,
    reranker: Option<Arc<dyn Reranker>>,
    fusion: FusionEngine,
    config: RetrievalConfig,
    embed_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl HybridRetriever {
    /// Creates a retriever.
    #[must_use]
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        let cache_capacity = NonZeroUsize::new(config.embed_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            embedder,
            extractor: None,
            reranker: None,
            fusion: FusionEngine::new(config.fusion, config.weights),
            embed_cache: Mutex::new(LruCache::new(cache_capacity)),
            config,
        }
    }

    /// Attaches an entity extractor, enabling the graph stage.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn EntityExtractor>) -> Self {
        self.set_extractor(extractor);
        self
    }

    /// Attaches a reranker for the bounded final pass.
    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.set_reranker(reranker);
        self
    }

    pub(crate) fn set_extractor(&mut self, extractor: Arc<dyn EntityExtractor>) {
        self.extractor = Some(extractor);
    }

    pub(crate) fn set_reranker(&mut self, reranker: Arc<dyn Reranker>) {
        self.reranker = Some(reranker);
    }

    /// Runs the full pipeline.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] on an empty query.
    /// - [`Error::RetrievalUnavailable`] when every stage failed.
    #[instrument(
        name = "engram.retrieval.search",
        skip(self, query, filter),
        fields(scope = %scope, top_k, component = "retrieval")
    )]
    pub async fn search(
        &self,
        scope: &OwnerScope,
        query: &str,
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<SearchResult> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("search query is empty".to_string()));
        }
        let start = Instant::now();

        // Stages 1-3 run concurrently, each under its own deadline.
        let (vector, lexical, graph) = tokio::join!(
            self.vector_stage(scope, query),
            self.lexical_stage(scope, query),
            self.graph_stage(scope, query),
        );
        let outcomes = [vector, lexical, graph];

        for outcome in &outcomes {
            metrics::histogram!(
                "retrieval_stage_duration_ms",
                "stage" => outcome.kind.as_str()
            )
            .record(ms_to_f64(outcome.duration_ms));
        }

        let completed = outcomes.iter().filter(|o| o.status.contributed()).count();
        let hard_failures = outcomes
            .iter()
            .filter(|o| matches!(o.status, StageStatus::Failed { .. } | StageStatus::TimedOut))
            .count();
        if completed == 0 && hard_failures > 0 {
            metrics::counter!("retrieval_requests_total", "status" => "unavailable").increment(1);
            return Err(Error::RetrievalUnavailable(
                "no retrieval stage produced a signal".to_string(),
            ));
        }

        // Stage 4: fuse (deduplicates by id), then intersect with the
        // caller's filters over the fetched records.
        let stage_candidates: Vec<StageCandidates> = outcomes
            .iter()
            .filter(|o| o.status.contributed())
            .map(|o| StageCandidates {
                kind: o.kind,
                hits: o.hits.clone(),
            })
            .collect();
        let fused = self.fusion.fuse(&stage_candidates);

        let ids: Vec<MemoryId> = fused.iter().map(|c| c.id.clone()).collect();
        let records = self.store.get_batch(&ids).await?;

        let now = current_timestamp();
        let mut hits: Vec<SearchHit> = fused
            .into_iter()
            .zip(records)
            .filter_map(|(candidate, record)| {
                let memory = record?;
                if &memory.owner_scope != scope || !filter.matches(&memory) {
                    return None;
                }
                // Recency is a tie-breaker multiplier, not a primary signal:
                // the weight is small enough to reorder near-ties only.
                let recency = 1.0 / (1.0 + memory.idle_days(now));
                let score = candidate.score * (1.0 + self.config.recency_weight * recency);
                Some(SearchHit {
                    memory,
                    score,
                    vector_score: candidate.vector_score,
                    lexical_score: candidate.lexical_score,
                    graph_score: candidate.graph_score,
                })
            })
            .collect();

        sort_hits(&mut hits);

        // Stage 6: bounded rerank, then re-sort with the same tie-break.
        let mut reranked = false;
        if self.config.rerank
            && let Some(reranker) = &self.reranker
        {
            let window = hits.len().min(self.config.effective_rerank_limit());
            for hit in &mut hits[..window] {
                hit.score = reranker.rescore(query, hit);
            }
            sort_hits(&mut hits);
            reranked = true;
        }
        hits.truncate(top_k);

        let degraded = hard_failures > 0;
        if degraded {
            debug!(scope = %scope, "retrieval degraded, continuing with remaining stages");
        }
        metrics::counter!(
            "retrieval_requests_total",
            "status" => if degraded { "degraded" } else { "success" }
        )
        .increment(1);

        Ok(SearchResult {
            hits,
            explanation: RetrievalExplanation {
                stages: outcomes.iter().map(StageOutcome::report).collect(),
                fusion: self.fusion.strategy(),
                degraded,
                reranked,
            },
            execution_time_ms: elapsed_ms(start),
        })
    }

    /// Embeds a query, reusing the bounded LRU cache.
    async fn query_embedding(&self, query: &str) -> Result<Vec<f32>> {
        let cached = self
            .embed_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(query)
            .cloned();
        if let Some(embedding) = cached {
            return Ok(embedding);
        }
        let embedding = self.embedder.embed(query).await?;
        self.embed_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(query.to_string(), embedding.clone());
        Ok(embedding)
    }

    async fn vector_stage(&self, scope: &OwnerScope, query: &str) -> StageOutcome {
        let start = Instant::now();
        let deadline = Duration::from_millis(self.config.stage_timeout_ms);

        let work = async {
            let embedding = self.query_embedding(query).await.map_err(|e| {
                Error::CollaboratorUnavailable {
                    collaborator: "embedder".to_string(),
                    cause: e.to_string(),
                }
            })?;
            self.store
                .vector_search(
                    scope,
                    &embedding,
                    self.config.vector_top_k,
                    self.config.min_similarity,
                )
                .await
        };

        match tokio::time::timeout(deadline, work).await {
            Ok(Ok(hits)) => StageOutcome {
                kind: StageKind::Vector,
                status: StageStatus::Completed,
                hits,
                duration_ms: elapsed_ms(start),
            },
            Ok(Err(e)) => StageOutcome {
                kind: StageKind::Vector,
                status: StageStatus::Failed {
                    cause: e.to_string(),
                },
                hits: Vec::new(),
                duration_ms: elapsed_ms(start),
            },
            Err(_) => StageOutcome {
                kind: StageKind::Vector,
                status: StageStatus::TimedOut,
                hits: Vec::new(),
                duration_ms: elapsed_ms(start),
            },
        }
    }

    async fn lexical_stage(&self, scope: &OwnerScope, query: &str) -> StageOutcome {
        let start = Instant::now();
        let deadline = Duration::from_millis(self.config.stage_timeout_ms);

        let work = self
            .store
            .lexical_search(scope, query, self.config.lexical_top_k);
        match tokio::time::timeout(deadline, work).await {
            Ok(Ok(hits)) => StageOutcome {
                kind: StageKind::Lexical,
                status: StageStatus::Completed,
                hits,
                duration_ms: elapsed_ms(start),
            },
            Ok(Err(e)) => StageOutcome {
                kind: StageKind::Lexical,
                status: StageStatus::Failed {
                    cause: e.to_string(),
                },
                hits: Vec::new(),
                duration_ms: elapsed_ms(start),
            },
            Err(_) => StageOutcome {
                kind: StageKind::Lexical,
                status: StageStatus::TimedOut,
                hits: Vec::new(),
                duration_ms: elapsed_ms(start),
            },
        }
    }

    async fn graph_stage(&self, scope: &OwnerScope, query: &str) -> StageOutcome {
        let start = Instant::now();
        let Some(extractor) = &self.extractor else {
            return StageOutcome {
                kind: StageKind::Graph,
                status: StageStatus::Skipped {
                    reason: "entity extractor not configured".to_string(),
                },
                hits: Vec::new(),
                duration_ms: 0,
            };
        };
        let deadline = Duration::from_millis(self.config.stage_timeout_ms);

        let work = async {
            let extracted = extractor.extract(query).await?;
            if extracted.is_empty() {
                return Ok(None);
            }
            let names: Vec<String> = extracted.into_iter().map(|e| e.name).collect();
            let entities = self.store.find_entities(scope, &names).await?;
            if entities.is_empty() {
                return Ok(None);
            }
            let start_ids: Vec<_> = entities.into_iter().map(|e| e.id).collect();
            let hits = self
                .store
                .graph_traverse(
                    scope,
                    &start_ids,
                    self.config.effective_max_hops(),
                    self.config.graph_top_k,
                )
                .await?;
            Ok::<Option<Vec<(MemoryId, f32)>>, Error>(Some(hits))
        };

        match tokio::time::timeout(deadline, work).await {
            Ok(Ok(Some(hits))) => StageOutcome {
                kind: StageKind::Graph,
                status: StageStatus::Completed,
                hits,
                duration_ms: elapsed_ms(start),
            },
            Ok(Ok(None)) => StageOutcome {
                kind: StageKind::Graph,
                status: StageStatus::Skipped {
                    reason: "no known entities in query".to_string(),
                },
                hits: Vec::new(),
                duration_ms: elapsed_ms(start),
            },
            Ok(Err(e)) => StageOutcome {
                kind: StageKind::Graph,
                status: StageStatus::Failed {
                    cause: e.to_string(),
                },
                hits: Vec::new(),
                duration_ms: elapsed_ms(start),
            },
            Err(_) => StageOutcome {
                kind: StageKind::Graph,
                status: StageStatus::TimedOut,
                hits: Vec::new(),
                duration_ms: elapsed_ms(start),
            },
        }
    }
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Deterministic ordering: score descending, `last_accessed_at` descending,
/// id ascending. Required for reproducible results.
fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.memory.last_accessed_at.cmp(&a.memory.last_accessed_at))
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Converts a millisecond count to f64 for metrics, capping at `u32::MAX`.
fn ms_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}
