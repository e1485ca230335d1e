//! Cross-component property tests.

use engram::config::{DecayConfig, TierPolicy};
use engram::lifecycle::{DecayScorer, TierManager};
use engram::models::{
    FusionStrategy, Memory, MemoryId, MemoryTier, OwnerScope, StageKind,
};
use engram::services::dedup::ContentHasher;
use engram::services::{FusionEngine, StageCandidates};
use engram::storage::{InMemoryStore, MemoryStore};
use proptest::prelude::*;
use std::sync::Arc;

fn tier_rank(tier: MemoryTier) -> u8 {
    match tier {
        MemoryTier::Working => 0,
        MemoryTier::ShortTerm => 1,
        MemoryTier::LongTerm => 2,
        MemoryTier::Archived => 3,
    }
}

fn memory(id: &str, importance: f32, created_days_ago: u64, idle_days: u64, now: u64) -> Memory {
    Memory {
        id: MemoryId::new(id),
        owner_scope: OwnerScope::new("prop"),
        content: format!("content {id}"),
        embedding: Vec::new(),
        tier: MemoryTier::Working,
        importance,
        decay_score: importance,
        content_hash: format!("{id}-hash"),
        created_at: now.saturating_sub(created_days_ago * 86_400),
        last_accessed_at: now.saturating_sub(idle_days * 86_400),
        access_count: 0,
        tags: Vec::new(),
        provenance: Vec::new(),
        superseded_by: None,
        archived_at: None,
        low_score_streak: 0,
        version: 0,
    }
}

proptest! {
    /// Decay never increases between two observation times without an
    /// access in between.
    #[test]
    fn decay_is_monotone_without_access(
        importance in 0.0f32..=1.0,
        rate in 0.01f32..=1.0,
        gap_days in 0u64..1000,
    ) {
        let scorer = DecayScorer::new(DecayConfig { decay_rate: rate });
        let now = 2_000_000_000u64;
        let m = memory("m", importance, 0, 0, now);
        let before = scorer.score(&m, now);
        let after = scorer.score(&m, now + gap_days * 86_400);
        prop_assert!(after <= before + f32::EPSILON);
    }

    /// Fused ranking is identical across repeated runs for fixed inputs.
    #[test]
    fn fusion_is_deterministic(
        vector_hits in prop::collection::vec(("[a-h]{1,2}", 0.0f32..1.0), 0..10),
        lexical_hits in prop::collection::vec(("[a-h]{1,2}", 0.0f32..5.0), 0..10),
    ) {
        let engine = FusionEngine::default();
        let stages = [
            StageCandidates {
                kind: StageKind::Vector,
                hits: vector_hits
                    .iter()
                    .map(|(id, s)| (MemoryId::new(id.clone()), *s))
                    .collect(),
            },
            StageCandidates {
                kind: StageKind::Lexical,
                hits: lexical_hits
                    .iter()
                    .map(|(id, s)| (MemoryId::new(id.clone()), *s))
                    .collect(),
            },
        ];

        let reference: Vec<(String, f32)> = engine
            .fuse(&stages)
            .into_iter()
            .map(|c| (c.id.to_string(), c.score))
            .collect();
        for _ in 0..5 {
            let run: Vec<(String, f32)> = engine
                .fuse(&stages)
                .into_iter()
                .map(|c| (c.id.to_string(), c.score))
                .collect();
            prop_assert_eq!(&reference, &run);
        }
    }

    /// Reciprocal-rank fusion is deterministic too.
    #[test]
    fn rrf_fusion_is_deterministic(
        hits in prop::collection::vec(("[a-h]{1,2}", 0.0f32..1.0), 1..10),
    ) {
        let engine = FusionEngine::new(
            FusionStrategy::ReciprocalRank,
            engram::config::RetrievalConfig::default().weights,
        );
        let stages = [StageCandidates {
            kind: StageKind::Vector,
            hits: hits
                .iter()
                .map(|(id, s)| (MemoryId::new(id.clone()), *s))
                .collect(),
        }];
        let a: Vec<String> = engine.fuse(&stages).iter().map(|c| c.id.to_string()).collect();
        let b: Vec<String> = engine.fuse(&stages).iter().map(|c| c.id.to_string()).collect();
        prop_assert_eq!(a, b);
    }

    /// Normalized hashing is insensitive to case and whitespace runs.
    #[test]
    fn hash_normalization_is_stable(words in prop::collection::vec("[a-zA-Z]{1,8}", 1..12)) {
        let plain = words.join(" ");
        let noisy = format!("  {}  ", words.join("   ")).to_uppercase();
        prop_assert_eq!(ContentHasher::hash(&plain), ContentHasher::hash(&noisy));
    }

    /// Observed tier sequences are subsequences of the forward progression:
    /// sweeps never move a memory backward, whatever the policy knobs.
    #[test]
    fn tiers_only_move_forward_under_sweeps(
        importance in 0.0f32..=1.0,
        created_days_ago in 0u64..100,
        idle_days in 0u64..400,
        ttl_days in 0.0f32..10.0,
        threshold in 0.0f32..0.5,
        grace in 1u32..4,
        sweeps in 1usize..6,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        runtime.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let now = engram::current_timestamp();
            let seeded = memory("m", importance, created_days_ago, idle_days.min(created_days_ago), now);
            store.put(&seeded).await.map_err(|e| TestCaseError::fail(e.to_string()))?;

            let policy = TierPolicy::default()
                .with_working_ttl_days(ttl_days)
                .with_archive_threshold(threshold)
                .with_archive_grace_cycles(grace);
            let manager = TierManager::new(store.clone(), DecayConfig::default(), policy);
            let scope = OwnerScope::new("prop");

            let mut observed = vec![tier_rank(MemoryTier::Working)];
            for _ in 0..sweeps {
                manager
                    .sweep(&scope)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                let current = store
                    .get(&MemoryId::new("m"))
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?
                    .ok_or_else(|| TestCaseError::fail("memory vanished"))?;
                observed.push(tier_rank(current.tier));
            }

            for pair in observed.windows(2) {
                prop_assert!(
                    pair[0] <= pair[1],
                    "tier moved backward: {} -> {}",
                    pair[0],
                    pair[1]
                );
            }
            Ok(())
        })?;
    }
}
