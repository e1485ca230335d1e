//! Score fusion for hybrid retrieval.
//!
//! Combines ranked candidate lists from heterogeneous stages into one scored
//! list, deduplicated by memory id. Two strategies:
//!
//! - **Weighted linear** (default): each stage's scores are max-normalized to
//!   `[0, 1]`, then combined as a weighted sum. Appropriate when per-stage
//!   scores are meaningful magnitudes.
//! - **Reciprocal rank**: `sum(1 / (k + rank))` with `k = 60`, the standard
//!   constant. Appropriate when absolute scores are not comparable across
//!   stages.
//!
//! Output order is fully deterministic: fused score descending, then id
//! ascending. Callers that want recency in the ordering apply it afterwards.
//!
//! # References
//!
//! - Cormack, G. V., Clarke, C. L., & Buettcher, S. (2009). "Reciprocal Rank
//!   Fusion outperforms Condorcet and individual Rank Learning Methods"

use crate::config::FusionWeights;
use crate::models::{FusionStrategy, MemoryId, StageKind};
use std::collections::HashMap;

/// The k constant for RRF scoring. Dampens the contribution of top ranks and
/// prevents division by zero.
const RRF_K: f32 = 60.0;

/// One stage's ranked candidates, best first.
#[derive(Debug, Clone)]
pub struct StageCandidates {
    /// Which stage produced these.
    pub kind: StageKind,
    /// `(id, raw_score)` pairs, ranked best first.
    pub hits: Vec<(MemoryId, f32)>,
}

/// A candidate after fusion, with its per-stage score breakdown.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    /// The memory id.
    pub id: MemoryId,
    /// Fused score.
    pub score: f32,
    /// Raw vector similarity, when the vector stage surfaced this candidate.
    pub vector_score: Option<f32>,
    /// Raw lexical relevance, when the lexical stage surfaced this candidate.
    pub lexical_score: Option<f32>,
    /// Raw graph association, when the graph stage surfaced this candidate.
    pub graph_score: Option<f32>,
}

impl FusedCandidate {
    fn new(id: MemoryId) -> Self {
        Self {
            id,
            score: 0.0,
            vector_score: None,
            lexical_score: None,
            graph_score: None,
        }
    }

    fn record_raw(&mut self, kind: StageKind, raw: f32) {
        match kind {
            StageKind::Vector => self.vector_score = Some(raw),
            StageKind::Lexical => self.lexical_score = Some(raw),
            StageKind::Graph => self.graph_score = Some(raw),
        }
    }
}

/// Combines per-stage rankings into one deduplicated, scored list.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    strategy: FusionStrategy,
    weights: FusionWeights,
}

impl FusionEngine {
    /// Creates a fusion engine.
    #[must_use]
    pub const fn new(strategy: FusionStrategy, weights: FusionWeights) -> Self {
        Self { strategy, weights }
    }

    /// The strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> FusionStrategy {
        self.strategy
    }

    const fn weight_for(&self, kind: StageKind) -> f32 {
        match kind {
            StageKind::Vector => self.weights.vector,
            StageKind::Lexical => self.weights.lexical,
            StageKind::Graph => self.weights.graph,
        }
    }

    /// Fuses stage candidate lists.
    ///
    /// The result contains each memory id at most once, with per-stage raw
    /// scores preserved for the explanation, ordered by fused score
    /// descending then id ascending.
    #[must_use]
    pub fn fuse(&self, stages: &[StageCandidates]) -> Vec<FusedCandidate> {
        let capacity: usize = stages.iter().map(|s| s.hits.len()).sum();
        let mut fused: HashMap<MemoryId, FusedCandidate> = HashMap::with_capacity(capacity);

        for stage in stages {
            let weight = self.weight_for(stage.kind);
            let stage_max = stage
                .hits
                .iter()
                .map(|(_, s)| *s)
                .fold(0.0f32, f32::max);

            for (rank, (id, raw)) in stage.hits.iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let contribution = match self.strategy {
                    FusionStrategy::WeightedLinear => {
                        let normalized = if stage_max > 0.0 { raw / stage_max } else { 0.0 };
                        weight * normalized
                    },
                    FusionStrategy::ReciprocalRank => 1.0 / (RRF_K + rank as f32 + 1.0),
                };

                let entry = fused
                    .entry(id.clone())
                    .or_insert_with(|| FusedCandidate::new(id.clone()));
                entry.score += contribution;
                entry.record_raw(stage.kind, *raw);
            }
        }

        let mut results: Vec<FusedCandidate> = fused.into_values().collect();
        results.sort_unstable_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results
    }
}
