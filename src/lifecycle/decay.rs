//! Decay scoring.
//!
//! A memory's survival is driven by recency of *use*, not of creation: every
//! read-path access resets the effective age, so frequently consulted
//! memories stay fresh indefinitely while untouched ones fade.

use crate::config::DecayConfig;
use crate::models::Memory;

/// Pure freshness/importance scorer.
///
/// `score = importance / (1 + decay_rate * idle_days)^2`, where `idle_days`
/// is measured from `last_accessed_at`. Deterministic, no I/O; between two
/// accesses the score is non-increasing in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecayScorer {
    config: DecayConfig,
}

impl DecayScorer {
    /// Creates a scorer with the given configuration.
    #[must_use]
    pub const fn new(config: DecayConfig) -> Self {
        Self { config }
    }

    /// Computes the decay score for a memory at time `now`.
    ///
    /// Clock skew (an access timestamp in the future) clamps the idle age to
    /// zero. `importance == 0` scores 0 immediately, making the memory an
    /// archive candidate on the next sweep regardless of age.
    #[must_use]
    pub fn score(&self, memory: &Memory, now: u64) -> f32 {
        self.score_raw(memory.importance, memory.idle_days(now))
    }

    /// Computes a decay score from raw components.
    #[must_use]
    pub fn score_raw(&self, importance: f32, idle_days: f32) -> f32 {
        if importance <= 0.0 {
            return 0.0;
        }
        let idle_days = idle_days.max(0.0);
        let denom = (1.0 + self.config.decay_rate * idle_days).powi(2);
        importance / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::current_timestamp;
    use crate::models::{MemoryId, MemoryTier, OwnerScope};

    fn memory_accessed_at(last_accessed_at: u64, importance: f32) -> Memory {
        Memory {
            id: MemoryId::new("m1"),
            owner_scope: OwnerScope::new("s1"),
            content: String::new(),
            embedding: Vec::new(),
            tier: MemoryTier::Working,
            importance,
            decay_score: importance,
            content_hash: String::new(),
            created_at: last_accessed_at,
            last_accessed_at,
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
    fn test_fresh_memory_scores_full_importance() {
        let scorer = DecayScorer::new(DecayConfig::default());
        let now = current_timestamp();
        let memory = memory_accessed_at(now, 0.8);
        assert!((scorer.score(&memory, now) - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_zero_importance_scores_zero_immediately() {
        let scorer = DecayScorer::new(DecayConfig::default());
        let now = current_timestamp();
        let memory = memory_accessed_at(now, 0.0);
        assert!(scorer.score(&memory, now).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clock_skew_clamps_to_zero_age() {
        let scorer = DecayScorer::new(DecayConfig::default());
        let now = current_timestamp();
        // Accessed "in the future" — skewed clock.
        let memory = memory_accessed_at(now + 86_400, 0.6);
        assert!((scorer.score(&memory, now) - 0.6).abs() < 0.001);
    }

    #[test]
    fn test_access_resets_effective_age() {
        let scorer = DecayScorer::new(DecayConfig::default());
        let now = current_timestamp();
        let mut memory = memory_accessed_at(now - 30 * 86_400, 0.9);

        let stale = scorer.score(&memory, now);
        memory.record_access(now);
        let refreshed = scorer.score(&memory, now);

        assert!(refreshed > stale);
        assert!((refreshed - 0.9).abs() < 0.001);
    }

    #[test]
    fn test_daily_access_keeps_important_memory_alive() {
        // A memory with importance 0.9, accessed daily for 30 days, never
        // approaches the archive threshold.
        let scorer = DecayScorer::new(DecayConfig::default());
        let threshold = crate::config::TierPolicy::default().archive_threshold;
        let start = current_timestamp();
        let mut memory = memory_accessed_at(start, 0.9);

        for day in 1..=30 {
            let now = start + day * 86_400;
            let score = scorer.score(&memory, now);
            assert!(
                score > threshold,
                "day {day}: score {score} fell below {threshold}"
            );
            memory.record_access(now);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Absent an access, the score never increases as time passes.
            #[test]
            fn prop_monotone_non_increasing(
                importance in 0.0f32..=1.0,
                rate in 0.01f32..=2.0,
                day_a in 0u64..3650,
                day_b in 0u64..3650,
            ) {
                let scorer = DecayScorer::new(DecayConfig { decay_rate: rate });
                let (early, late) = if day_a <= day_b { (day_a, day_b) } else { (day_b, day_a) };
                let memory = memory_accessed_at(0, importance);
                let score_early = scorer.score(&memory, early * 86_400);
                let score_late = scorer.score(&memory, late * 86_400);
                prop_assert!(score_late <= score_early + f32::EPSILON);
            }

            /// Scores stay within [0, importance].
            #[test]
            fn prop_bounded_by_importance(
                importance in 0.0f32..=1.0,
                rate in 0.01f32..=2.0,
                idle_days in 0.0f32..=3650.0,
            ) {
                let scorer = DecayScorer::new(DecayConfig { decay_rate: rate });
                let score = scorer.score_raw(importance, idle_days);
                prop_assert!(score >= 0.0);
                prop_assert!(score <= importance + f32::EPSILON);
            }
        }
    }
}
