//! Optional final reranking pass.
//!
//! Reranking runs on a bounded prefix of the fused list (at most 50
//! candidates) and may use signals too expensive for the fusion hot path.
//! The default implementation blends the fused score with query-term overlap
//! and cross-stage agreement; an LLM- or cross-encoder-backed scorer plugs
//! into the same trait.

use crate::models::SearchHit;
use std::collections::HashSet;

/// Trait for rerank scorers.
pub trait Reranker: Send + Sync {
    /// Produces a replacement score for one candidate.
    ///
    /// Called once per candidate within the rerank window; the caller
    /// re-sorts afterwards with the standard deterministic tie-break.
    fn rescore(&self, query: &str, hit: &SearchHit) -> f32;
}

/// Term-overlap reranker.
///
/// Blends three cheap cross-signals: the fused score, Jaccard overlap
/// between query terms and content terms, and how many retrieval stages
/// surfaced the candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapReranker;

impl TermOverlapReranker {
    const FUSED_WEIGHT: f32 = 0.6;
    const OVERLAP_WEIGHT: f32 = 0.25;
    const COVERAGE_WEIGHT: f32 = 0.15;

    /// Creates a new term-overlap reranker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn terms(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn jaccard(query: &str, content: &str) -> f32 {
        let q = Self::terms(query);
        let c = Self::terms(content);
        if q.is_empty() || c.is_empty() {
            return 0.0;
        }
        let intersection = q.intersection(&c).count() as f32;
        let union = q.union(&c).count() as f32;
        intersection / union
    }
}

impl Reranker for TermOverlapReranker {
    #[allow(clippy::cast_precision_loss)]
    fn rescore(&self, query: &str, hit: &SearchHit) -> f32 {
        let overlap = Self::jaccard(query, &hit.memory.content);
        let coverage = [
            hit.vector_score.is_some(),
            hit.lexical_score.is_some(),
            hit.graph_score.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count() as f32
            / 3.0;

        Self::FUSED_WEIGHT * hit.score
            + Self::OVERLAP_WEIGHT * overlap
            + Self::COVERAGE_WEIGHT * coverage
    }
}
