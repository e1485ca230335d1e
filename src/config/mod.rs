//! Engine configuration.
//!
//! Every component takes a small config struct with sensible defaults.
//! Overrides come from three places, lowest to highest precedence:
//! defaults, a TOML config file, then `ENGRAM_*` environment variables.

use crate::models::FusionStrategy;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Hard cap on graph traversal depth, bounding combinatorial growth.
pub const MAX_GRAPH_HOPS: u32 = 3;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Decay scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayConfig {
    /// Decay rate per idle day. Higher values age memories out faster.
    pub decay_rate: f32,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self { decay_rate: 0.1 }
    }
}

impl DecayConfig {
    /// Sets the decay rate.
    #[must_use]
    pub const fn with_decay_rate(mut self, rate: f32) -> Self {
        self.decay_rate = rate;
        self
    }
}

/// Tier transition policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPolicy {
    /// Days a memory may stay in `Working` before age-based promotion.
    pub working_ttl_days: f32,
    /// Access count above which a `Working` memory promotes immediately.
    pub working_promotion_count: u64,
    /// Decay score below which a memory becomes an archive candidate.
    pub archive_threshold: f32,
    /// Consecutive sweeps below the threshold required before archival.
    ///
    /// Hysteresis: borderline scores must stay low for this many sweeps,
    /// preventing thrashing around the threshold.
    pub archive_grace_cycles: u32,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            working_ttl_days: 1.0,
            working_promotion_count: 3,
            archive_threshold: 0.05,
            archive_grace_cycles: 3,
        }
    }
}

impl TierPolicy {
    /// Sets the working-tier TTL in days.
    #[must_use]
    pub const fn with_working_ttl_days(mut self, days: f32) -> Self {
        self.working_ttl_days = days;
        self
    }

    /// Sets the access-count promotion trigger.
    #[must_use]
    pub const fn with_working_promotion_count(mut self, count: u64) -> Self {
        self.working_promotion_count = count;
        self
    }

    /// Sets the archive threshold.
    #[must_use]
    pub const fn with_archive_threshold(mut self, threshold: f32) -> Self {
        self.archive_threshold = threshold;
        self
    }

    /// Sets the archival grace cycles.
    #[must_use]
    pub const fn with_archive_grace_cycles(mut self, cycles: u32) -> Self {
        self.archive_grace_cycles = cycles;
        self
    }
}

/// Per-stage weights for weighted-linear fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    /// Weight of the vector stage.
    pub vector: f32,
    /// Weight of the lexical stage.
    pub lexical: f32,
    /// Weight of the graph stage.
    pub graph: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: 0.5,
            lexical: 0.3,
            graph: 0.2,
        }
    }
}

/// Hybrid retrieval parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Vector stage candidate budget.
    pub vector_top_k: usize,
    /// Lexical stage candidate budget.
    pub lexical_top_k: usize,
    /// Graph stage candidate budget.
    pub graph_top_k: usize,
    /// Minimum cosine similarity for vector candidates.
    pub min_similarity: f32,
    /// Graph traversal depth. Clamped to [`MAX_GRAPH_HOPS`].
    pub max_hops: u32,
    /// Per-stage deadline in milliseconds.
    pub stage_timeout_ms: u64,
    /// Fusion strategy.
    pub fusion: FusionStrategy,
    /// Stage weights for weighted-linear fusion.
    pub weights: FusionWeights,
    /// Recency tie-breaker multiplier weight.
    ///
    /// Kept small so recency can reorder near-ties but never outweigh
    /// relevance.
    pub recency_weight: f32,
    /// Whether the bounded rerank pass runs.
    pub rerank: bool,
    /// Rerank candidate cap. Clamped to 50.
    pub rerank_limit: usize,
    /// Query-embedding LRU cache capacity.
    pub embed_cache_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_top_k: 50,
            lexical_top_k: 50,
            graph_top_k: 25,
            min_similarity: 0.6,
            max_hops: 2,
            stage_timeout_ms: 2_000,
            fusion: FusionStrategy::default(),
            weights: FusionWeights::default(),
            recency_weight: 0.01,
            rerank: false,
            rerank_limit: 50,
            embed_cache_size: 256,
        }
    }
}

impl RetrievalConfig {
    /// Traversal depth after applying the hard cap.
    #[must_use]
    pub const fn effective_max_hops(&self) -> u32 {
        if self.max_hops > MAX_GRAPH_HOPS {
            MAX_GRAPH_HOPS
        } else {
            self.max_hops
        }
    }

    /// Rerank cap after applying the hard limit.
    #[must_use]
    pub const fn effective_rerank_limit(&self) -> usize {
        if self.rerank_limit > 50 { 50 } else { self.rerank_limit }
    }

    /// Sets the fusion strategy.
    #[must_use]
    pub const fn with_fusion(mut self, fusion: FusionStrategy) -> Self {
        self.fusion = fusion;
        self
    }

    /// Sets the per-stage deadline.
    #[must_use]
    pub const fn with_stage_timeout_ms(mut self, ms: u64) -> Self {
        self.stage_timeout_ms = ms;
        self
    }

    /// Enables the rerank pass.
    #[must_use]
    pub const fn with_rerank(mut self, enabled: bool) -> Self {
        self.rerank = enabled;
        self
    }
}

/// Consolidation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsolidationConfig {
    /// Minimum age in days before a short-term memory becomes a candidate.
    pub min_age_days: f32,
    /// Similarity at or above which two memories are semantic duplicates.
    ///
    /// Strictly higher than retrieval's `min_similarity`: related-but-distinct
    /// memories must never merge.
    pub semantic_duplicate_threshold: f32,
    /// Deadline for one summarizer merge call, in milliseconds.
    pub merge_timeout_ms: u64,
    /// Bounded attempts for optimistic-version write retries.
    pub max_write_attempts: u32,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            min_age_days: 0.5,
            semantic_duplicate_threshold: 0.95,
            merge_timeout_ms: 10_000,
            max_write_attempts: 3,
        }
    }
}

impl ConsolidationConfig {
    /// Sets the semantic duplicate threshold.
    #[must_use]
    pub const fn with_semantic_duplicate_threshold(mut self, threshold: f32) -> Self {
        self.semantic_duplicate_threshold = threshold;
        self
    }

    /// Sets the candidate minimum age.
    #[must_use]
    pub const fn with_min_age_days(mut self, days: f32) -> Self {
        self.min_age_days = days;
        self
    }
}

/// Lifecycle scheduler parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Seconds between decay/tier sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds between consolidation batches.
    pub consolidation_interval_secs: u64,
    /// Concurrent owner scopes processed at once.
    pub max_concurrent_scopes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            consolidation_interval_secs: 600,
            max_concurrent_scopes: 4,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    /// Decay scoring parameters.
    pub decay: DecayConfig,
    /// Tier transition policy.
    pub tiers: TierPolicy,
    /// Hybrid retrieval parameters.
    pub retrieval: RetrievalConfig,
    /// Consolidation parameters.
    pub consolidation: ConsolidationConfig,
    /// Scheduler parameters.
    pub scheduler: SchedulerConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    decay: Option<DecaySection>,
    tiers: Option<TierSection>,
    retrieval: Option<RetrievalSection>,
    consolidation: Option<ConsolidationSection>,
    scheduler: Option<SchedulerSection>,
}

#[derive(Debug, Deserialize, Default)]
struct DecaySection {
    decay_rate: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct TierSection {
    working_ttl_days: Option<f32>,
    working_promotion_count: Option<u64>,
    archive_threshold: Option<f32>,
    archive_grace_cycles: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RetrievalSection {
    vector_top_k: Option<usize>,
    lexical_top_k: Option<usize>,
    graph_top_k: Option<usize>,
    min_similarity: Option<f32>,
    max_hops: Option<u32>,
    stage_timeout_ms: Option<u64>,
    fusion: Option<String>,
    vector_weight: Option<f32>,
    lexical_weight: Option<f32>,
    graph_weight: Option<f32>,
    rerank: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ConsolidationSection {
    min_age_days: Option<f32>,
    semantic_duplicate_threshold: Option<f32>,
    merge_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SchedulerSection {
    sweep_interval_secs: Option<u64>,
    consolidation_interval_secs: Option<u64>,
    max_concurrent_scopes: Option<usize>,
}

impl EngineConfig {
    /// Loads configuration from a TOML file, applied over defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::InvalidInput(format!(
                "cannot read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let file: ConfigFile = toml::from_str(&raw)
            .map_err(|e| Error::InvalidInput(format!("cannot parse config file: {e}")))?;
        Ok(Self::default().apply_file(file))
    }

    /// Creates a configuration from defaults plus environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn apply_file(mut self, file: ConfigFile) -> Self {
        if let Some(s) = file.decay
            && let Some(v) = s.decay_rate
        {
            self.decay.decay_rate = v;
        }
        if let Some(s) = file.tiers {
            if let Some(v) = s.working_ttl_days {
                self.tiers.working_ttl_days = v;
            }
            if let Some(v) = s.working_promotion_count {
                self.tiers.working_promotion_count = v;
            }
            if let Some(v) = s.archive_threshold {
                self.tiers.archive_threshold = v;
            }
            if let Some(v) = s.archive_grace_cycles {
                self.tiers.archive_grace_cycles = v.max(1);
            }
        }
        if let Some(s) = file.retrieval {
            if let Some(v) = s.vector_top_k {
                self.retrieval.vector_top_k = v;
            }
            if let Some(v) = s.lexical_top_k {
                self.retrieval.lexical_top_k = v;
            }
            if let Some(v) = s.graph_top_k {
                self.retrieval.graph_top_k = v;
            }
            if let Some(v) = s.min_similarity {
                self.retrieval.min_similarity = v.clamp(0.0, 1.0);
            }
            if let Some(v) = s.max_hops {
                self.retrieval.max_hops = v;
            }
            if let Some(v) = s.stage_timeout_ms {
                self.retrieval.stage_timeout_ms = v;
            }
            if let Some(v) = s.fusion {
                self.retrieval.fusion = parse_fusion(&v);
            }
            if let Some(v) = s.vector_weight {
                self.retrieval.weights.vector = v;
            }
            if let Some(v) = s.lexical_weight {
                self.retrieval.weights.lexical = v;
            }
            if let Some(v) = s.graph_weight {
                self.retrieval.weights.graph = v;
            }
            if let Some(v) = s.rerank {
                self.retrieval.rerank = v;
            }
        }
        if let Some(s) = file.consolidation {
            if let Some(v) = s.min_age_days {
                self.consolidation.min_age_days = v;
            }
            if let Some(v) = s.semantic_duplicate_threshold {
                self.consolidation.semantic_duplicate_threshold = v.clamp(0.0, 1.0);
            }
            if let Some(v) = s.merge_timeout_ms {
                self.consolidation.merge_timeout_ms = v;
            }
        }
        if let Some(s) = file.scheduler {
            if let Some(v) = s.sweep_interval_secs {
                self.scheduler.sweep_interval_secs = v.max(1);
            }
            if let Some(v) = s.consolidation_interval_secs {
                self.scheduler.consolidation_interval_secs = v.max(1);
            }
            if let Some(v) = s.max_concurrent_scopes {
                self.scheduler.max_concurrent_scopes = v.max(1);
            }
        }
        self
    }

    /// Applies `ENGRAM_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<f32>("ENGRAM_DECAY_RATE") {
            self.decay.decay_rate = v;
        }
        if let Some(v) = env_parse::<f32>("ENGRAM_WORKING_TTL_DAYS") {
            self.tiers.working_ttl_days = v;
        }
        if let Some(v) = env_parse::<u64>("ENGRAM_WORKING_PROMOTION_COUNT") {
            self.tiers.working_promotion_count = v;
        }
        if let Some(v) = env_parse::<f32>("ENGRAM_ARCHIVE_THRESHOLD") {
            self.tiers.archive_threshold = v;
        }
        if let Some(v) = env_parse::<u32>("ENGRAM_ARCHIVE_GRACE_CYCLES") {
            self.tiers.archive_grace_cycles = v.max(1);
        }
        if let Some(v) = env_parse::<f32>("ENGRAM_MIN_SIMILARITY") {
            self.retrieval.min_similarity = v.clamp(0.0, 1.0);
        }
        if let Some(v) = env_parse::<u32>("ENGRAM_MAX_HOPS") {
            self.retrieval.max_hops = v;
        }
        if let Some(v) = env_parse::<u64>("ENGRAM_STAGE_TIMEOUT_MS") {
            self.retrieval.stage_timeout_ms = v;
        }
        if let Ok(v) = std::env::var("ENGRAM_FUSION") {
            self.retrieval.fusion = parse_fusion(&v);
        }
        if let Some(v) = env_parse::<f32>("ENGRAM_SEMANTIC_DUPLICATE_THRESHOLD") {
            self.consolidation.semantic_duplicate_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = env_parse::<u64>("ENGRAM_SWEEP_INTERVAL_SECS") {
            self.scheduler.sweep_interval_secs = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("ENGRAM_CONSOLIDATION_INTERVAL_SECS") {
            self.scheduler.consolidation_interval_secs = v.max(1);
        }
        self
    }
}

fn parse_fusion(s: &str) -> FusionStrategy {
    match s.to_lowercase().as_str() {
        "rrf" | "reciprocal_rank" | "reciprocal-rank" => FusionStrategy::ReciprocalRank,
        _ => FusionStrategy::WeightedLinear,
    }
}
