//! Search filters, results, and retrieval explanations.

use super::memory::{Memory, MemoryId};
use super::tier::MemoryTier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How per-stage scores are combined into one ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Weighted linear combination of max-normalized stage scores (default).
    #[default]
    WeightedLinear,
    /// Reciprocal-rank fusion; use when absolute scores are not comparable
    /// across stages.
    ReciprocalRank,
}

impl FusionStrategy {
    /// Returns the strategy as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WeightedLinear => "weighted_linear",
            Self::ReciprocalRank => "reciprocal_rank",
        }
    }
}

/// Filter criteria applied after the retrieval stages.
///
/// Filtering runs post-retrieval so stage results stay reusable across
/// filter variants. An empty `tiers` list means the default searchable set
/// (everything except `Archived`); audit paths opt into archived content by
/// listing it explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Restrict to these tiers. Empty means all non-archived tiers.
    pub tiers: Vec<MemoryTier>,
    /// Require all of these tags (AND logic).
    pub tags: Vec<String>,
    /// Minimum creation timestamp (inclusive).
    pub created_after: Option<u64>,
    /// Maximum creation timestamp (exclusive).
    pub created_before: Option<u64>,
}

impl SearchFilter {
    /// Creates an empty filter (default searchable set).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tiers: Vec::new(),
            tags: Vec::new(),
            created_after: None,
            created_before: None,
        }
    }

    /// Adds a tier filter.
    #[must_use]
    pub fn with_tier(mut self, tier: MemoryTier) -> Self {
        self.tiers.push(tier);
        self
    }

    /// Adds a required tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Restricts to memories created at or after the timestamp.
    #[must_use]
    pub const fn created_after(mut self, timestamp: u64) -> Self {
        self.created_after = Some(timestamp);
        self
    }

    /// Restricts to memories created before the timestamp.
    #[must_use]
    pub const fn created_before(mut self, timestamp: u64) -> Self {
        self.created_before = Some(timestamp);
        self
    }

    /// Returns `true` if `memory` passes this filter.
    #[must_use]
    pub fn matches(&self, memory: &Memory) -> bool {
        let tier_ok = if self.tiers.is_empty() {
            memory.tier.is_searchable()
        } else {
            self.tiers.contains(&memory.tier)
        };
        if !tier_ok {
            return false;
        }
        if !self.tags.iter().all(|t| memory.tags.contains(t)) {
            return false;
        }
        if let Some(after) = self.created_after
            && memory.created_at < after
        {
            return false;
        }
        if let Some(before) = self.created_before
            && memory.created_at >= before
        {
            return false;
        }
        true
    }
}

/// The retrieval signal a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Embedding cosine-similarity search.
    Vector,
    /// Keyword relevance (BM25-style) search.
    Lexical,
    /// Bounded-hop graph association.
    Graph,
}

impl StageKind {
    /// Returns the stage as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Lexical => "lexical",
            Self::Graph => "graph",
        }
    }

    /// All stages in pipeline order.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Vector, Self::Lexical, Self::Graph]
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a retrieval stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage completed within its deadline.
    Completed,
    /// The stage exceeded its deadline; the request degraded without it.
    TimedOut,
    /// The stage errored; the request degraded without it.
    Failed {
        /// The underlying cause, for the explanation record.
        cause: String,
    },
    /// The stage was not runnable for this request (no embedding available,
    /// no entities extracted from the query).
    Skipped {
        /// Why the stage did not run.
        reason: String,
    },
}

impl StageStatus {
    /// Returns `true` if the stage contributed candidates.
    #[must_use]
    pub const fn contributed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Per-stage record in a retrieval explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Which stage this reports on.
    pub kind: StageKind,
    /// How the stage ended.
    pub status: StageStatus,
    /// Candidates the stage contributed before filtering.
    pub candidates: usize,
    /// Stage wall time in milliseconds.
    pub duration_ms: u64,
}

/// Why a result list looks the way it does.
///
/// Always returned with search results, including degraded ones, so callers
/// can tell which signals contributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalExplanation {
    /// One report per pipeline stage.
    pub stages: Vec<StageReport>,
    /// Fusion strategy used.
    pub fusion: FusionStrategy,
    /// Whether any stage failed or timed out.
    pub degraded: bool,
    /// Whether the bounded rerank pass ran.
    pub reranked: bool,
}

impl RetrievalExplanation {
    /// Returns the report for a specific stage, if present.
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.kind == kind)
    }
}

/// A single search hit with its score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matched memory.
    pub memory: Memory,
    /// Fused score.
    pub score: f32,
    /// Vector similarity, when the vector stage surfaced this hit.
    pub vector_score: Option<f32>,
    /// Lexical relevance, when the lexical stage surfaced this hit.
    pub lexical_score: Option<f32>,
    /// Graph association strength, when the graph stage surfaced this hit.
    pub graph_score: Option<f32>,
}

impl SearchHit {
    /// The hit's memory id.
    #[must_use]
    pub const fn id(&self) -> &MemoryId {
        &self.memory.id
    }
}

/// Result of a hybrid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ranked hits, best first. Deterministic: fused score descending, then
    /// `last_accessed_at` descending, then id ascending.
    pub hits: Vec<SearchHit>,
    /// Which stages contributed, and how.
    pub explanation: RetrievalExplanation,
    /// Total search wall time in milliseconds.
    pub execution_time_ms: u64,
}
