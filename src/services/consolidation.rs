//! Consolidation engine.
//!
//! Periodic batch process keeping a scope bounded: finds duplicate and
//! overlapping memories, merges each set into one canonical record, and
//! de-surfaces the rest. Information is never discarded — duplicates are
//! archived with a back-reference, and their provenance moves onto the
//! canonical memory.
//!
//! # Concurrency
//!
//! At most one run per owner scope at any time: the scope lock is acquired
//! before detection and held until every candidate set in the batch has
//! committed or been abandoned. A contended lock surfaces
//! [`Error::LockContended`]; the scheduler skips that cycle rather than
//! block.
//!
//! # Failure semantics
//!
//! A failed merge (summarizer error, store error) leaves its candidate set
//! completely untouched and is reported in the run's
//! [`ConsolidationReport::errors`]; the set is retried on the next scheduled
//! run. Memory-record commits are all-or-nothing per candidate set via
//! `put_batch`.

use super::dedup::{ContentHasher, cluster_semantic, group_by_hash};
use crate::config::ConsolidationConfig;
use crate::current_timestamp;
use crate::embedding::Embedder;
use crate::models::{
    ConsolidationError, ConsolidationReport, Memory, MemoryTier, NodeRef, OwnerScope, Relationship,
};
use crate::storage::MemoryStore;
use crate::summarize::Summarizer;
use crate::{Error, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Merges duplicate memories under a per-scope lock.
pub struct ConsolidationEngine {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    summarizer: Arc<dyn Summarizer>,
    config: ConsolidationConfig,
}

impl ConsolidationEngine {
    /// Creates a consolidation engine.
    #[must_use]
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn Summarizer>,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            summarizer,
            config,
        }
    }

    /// Runs one consolidation batch over a scope.
    ///
    /// # Errors
    ///
    /// - [`Error::LockContended`] when another run holds the scope.
    /// - Store errors from the initial listing; per-set failures are
    ///   reported in the result instead of raised.
    #[instrument(
        name = "engram.consolidation.run",
        skip(self),
        fields(scope = %scope, component = "consolidation")
    )]
    pub async fn consolidate(&self, scope: &OwnerScope) -> Result<ConsolidationReport> {
        // Held for the whole batch; dropped on return.
        let _lock = self.store.acquire_scope_lock(scope).await?;
        let start = Instant::now();
        let now = current_timestamp();

        let all = self.store.list_scope(scope).await?;
        let live: Vec<Memory> = all
            .into_iter()
            .filter(|m| m.tier != MemoryTier::Archived)
            .collect();

        // Aged short-term memories are the regular batch; content-hash
        // collisions join regardless of tier or age because ingestion routes
        // them here explicitly.
        let aged: Vec<Memory> = live
            .iter()
            .filter(|m| {
                m.tier == MemoryTier::ShortTerm && m.age_days(now) >= self.config.min_age_days
            })
            .cloned()
            .collect();

        let exact_sets = group_by_hash(&live);
        let exact_members: HashSet<_> = exact_sets
            .iter()
            .flatten()
            .map(|m| m.id.clone())
            .collect();

        let semantic_seeds: Vec<Memory> = aged
            .iter()
            .filter(|m| !exact_members.contains(&m.id))
            .cloned()
            .collect();
        // A re-learned fact may fold into its long-term predecessor.
        let attachable: Vec<Memory> = live
            .iter()
            .filter(|m| {
                m.tier == MemoryTier::LongTerm || semantic_seeds.iter().any(|s| s.id == m.id)
            })
            .cloned()
            .collect();
        let semantic_sets = cluster_semantic(
            self.store.as_ref(),
            scope,
            &semantic_seeds,
            &attachable,
            self.config.semantic_duplicate_threshold,
        )
        .await?;

        let mut report = ConsolidationReport {
            candidates: live.len(),
            ..Default::default()
        };

        for set in exact_sets.into_iter().chain(semantic_sets) {
            report.duplicate_sets += 1;
            match self.merge_set(scope, &set, now).await {
                Ok(archived) => {
                    report.merged += 1;
                    report.archived += archived;
                },
                Err(e) => {
                    warn!(scope = %scope, error = %e, "merge abandoned, set left untouched");
                    report.errors.push(ConsolidationError {
                        memory_ids: set.iter().map(|m| m.id.clone()).collect(),
                        cause: e.to_string(),
                    });
                },
            }
        }

        report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        metrics::counter!(
            "consolidation_runs_total",
            "status" => if report.errors.is_empty() { "success" } else { "partial" }
        )
        .increment(1);
        metrics::counter!("consolidation_merge_total").increment(report.merged as u64);
        debug!(scope = %scope, summary = %report.summary(), "consolidation batch done");

        Ok(report)
    }

    /// Merges one candidate set. Returns how many duplicates were archived.
    ///
    /// Nothing is written unless every step before the commit succeeds, and
    /// the commit itself is atomic.
    async fn merge_set(&self, scope: &OwnerScope, set: &[Memory], now: u64) -> Result<usize> {
        let canonical_id = select_canonical(set).ok_or_else(|| {
            Error::InvalidInput("candidate set must not be empty".to_string())
        })?;
        let mut canonical = set
            .iter()
            .find(|m| m.id == canonical_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(canonical_id.to_string()))?;
        let duplicates: Vec<&Memory> = set.iter().filter(|m| m.id != canonical_id).collect();

        // Produce merged content only when the contents differ non-trivially.
        let distinct: Vec<&str> = {
            let mut seen = HashSet::new();
            set.iter()
                .filter(|m| seen.insert(ContentHasher::normalize(&m.content)))
                .map(|m| m.content.as_str())
                .collect()
        };
        if distinct.len() > 1 {
            let deadline = Duration::from_millis(self.config.merge_timeout_ms);
            let merged = tokio::time::timeout(deadline, self.summarizer.merge(&distinct))
                .await
                .map_err(|_| Error::CollaboratorUnavailable {
                    collaborator: "summarizer".to_string(),
                    cause: format!("merge timed out after {}ms", self.config.merge_timeout_ms),
                })??;
            canonical.embedding = self.embedder.embed(&merged).await.map_err(|e| {
                Error::CollaboratorUnavailable {
                    collaborator: "embedder".to_string(),
                    cause: e.to_string(),
                }
            })?;
            canonical.content_hash = ContentHasher::hash(&merged);
            canonical.content = merged;
        }

        // Provenance is concatenated, tags unioned; nothing is discarded.
        for duplicate in &duplicates {
            canonical.provenance.extend(duplicate.provenance.iter().cloned());
            for tag in &duplicate.tags {
                if !canonical.tags.contains(tag) {
                    canonical.tags.push(tag.clone());
                }
            }
        }
        canonical.tags.sort();
        if canonical.tier.can_transition_to(MemoryTier::LongTerm) {
            canonical.tier = MemoryTier::LongTerm;
        }
        canonical.low_score_streak = 0;

        let mut batch = vec![canonical.clone()];
        for duplicate in &duplicates {
            let mut archived = (*duplicate).clone();
            archived.tier = MemoryTier::Archived;
            archived.superseded_by = Some(canonical.id.clone());
            archived.archived_at = Some(Utc::now());
            batch.push(archived);
        }

        // All-or-nothing commit for the whole set, with bounded retries on
        // transient store failures.
        crate::storage::retry_transient(self.config.max_write_attempts, 50, || {
            self.store.put_batch(&batch)
        })
        .await?;

        // Re-point graph edges from archived duplicates to the canonical
        // memory. Edge maintenance is advisory: a failure here is logged,
        // not raised, and never un-commits the merge.
        for duplicate in &duplicates {
            if let Err(e) = self.repoint_edges(scope, duplicate, &canonical, now).await {
                warn!(
                    memory_id = %duplicate.id,
                    error = %e,
                    "edge re-pointing failed after merge"
                );
            }
        }

        Ok(duplicates.len())
    }

    /// Soft-invalidates a duplicate's active edges and recreates them
    /// against the canonical memory.
    async fn repoint_edges(
        &self,
        scope: &OwnerScope,
        duplicate: &Memory,
        canonical: &Memory,
        now: u64,
    ) -> Result<()> {
        let edges = self
            .store
            .relationships_for_memory(&duplicate.id, true)
            .await?;
        for mut edge in edges {
            let from = match &edge.from {
                NodeRef::Memory(id) if *id == duplicate.id => {
                    NodeRef::Memory(canonical.id.clone())
                },
                other => other.clone(),
            };
            let to = match &edge.to {
                NodeRef::Memory(id) if *id == duplicate.id => NodeRef::Memory(canonical.id.clone()),
                other => other.clone(),
            };
            let replacement = Relationship::new(scope.clone(), from, to, edge.kind, edge.weight);
            edge.invalidate(now);
            self.store.put_relationship(&edge).await?;
            self.store.put_relationship(&replacement).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConsolidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Picks the canonical member: highest importance, ties broken by earliest
/// `created_at`, then smallest id for determinism.
fn select_canonical(set: &[Memory]) -> Option<crate::models::MemoryId> {
    set.iter()
        .max_by(|a, b| {
            a.importance
                .partial_cmp(&b.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|m| m.id.clone())
}
