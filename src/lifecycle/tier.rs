//! Tier transition state machine.

use crate::config::{DecayConfig, TierPolicy};
use crate::current_timestamp;
use crate::lifecycle::DecayScorer;
use crate::models::{Memory, MemoryTier, OwnerScope, SweepReport};
use crate::storage::{MemoryStore, update_with_retry};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{instrument, warn};

/// Bounded attempts for conflicting-field write retries during a sweep.
const SWEEP_WRITE_ATTEMPTS: u32 = 3;

/// What one sweep decided for one memory.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SweepAction {
    /// Promote `Working → ShortTerm`.
    Promote,
    /// Archive out of `ShortTerm`/`LongTerm`.
    Archive,
    /// Refresh the decay score and streak only.
    Rescore,
}

/// Drives tier transitions from decay scores and access counters.
///
/// Transitions are evaluated each sweep, in order, first match wins:
///
/// 1. `Working → ShortTerm` on age past `working_ttl_days` or access count
///    past `working_promotion_count`.
/// 2. `ShortTerm → LongTerm` — never here; consolidation is the only gate, so
///    long-term holds only deduplicated, reviewed content.
/// 3. `{ShortTerm, LongTerm} → Archived` after `archive_grace_cycles`
///    consecutive sweeps below `archive_threshold`.
///
/// A transition that fails to persist is logged and retried on the next
/// sweep; the sweep itself keeps going.
pub struct TierManager {
    store: Arc<dyn MemoryStore>,
    scorer: DecayScorer,
    policy: TierPolicy,
}

impl TierManager {
    /// Creates a tier manager over a store.
    #[must_use]
    pub fn new(store: Arc<dyn MemoryStore>, decay: DecayConfig, policy: TierPolicy) -> Self {
        Self {
            store,
            scorer: DecayScorer::new(decay),
            policy,
        }
    }

    /// Decides the action for one memory. Pure; exercised directly in tests.
    fn evaluate(&self, memory: &Memory, decay_score: f32, now: u64) -> SweepAction {
        match memory.tier {
            MemoryTier::Working => {
                if memory.age_days(now) > self.policy.working_ttl_days
                    || memory.access_count > self.policy.working_promotion_count
                {
                    SweepAction::Promote
                } else {
                    SweepAction::Rescore
                }
            },
            MemoryTier::ShortTerm | MemoryTier::LongTerm => {
                if decay_score < self.policy.archive_threshold
                    && memory.low_score_streak + 1 >= self.policy.archive_grace_cycles
                {
                    SweepAction::Archive
                } else {
                    SweepAction::Rescore
                }
            },
            MemoryTier::Archived => SweepAction::Rescore,
        }
    }

    /// Runs one decay/tier sweep over a scope.
    ///
    /// # Errors
    ///
    /// Returns an error only when the scope listing itself fails; per-memory
    /// persistence failures are absorbed into `SweepReport::deferred`.
    #[instrument(
        name = "engram.lifecycle.sweep",
        skip(self),
        fields(scope = %scope, component = "lifecycle", operation = "sweep")
    )]
    pub async fn sweep(&self, scope: &OwnerScope) -> Result<SweepReport> {
        let start = Instant::now();
        let now = current_timestamp();
        let mut report = SweepReport::default();

        let memories = self.store.list_scope(scope).await?;
        for memory in &memories {
            if memory.tier == MemoryTier::Archived {
                continue;
            }
            report.scanned += 1;

            let decay_score = self.scorer.score(memory, now);
            let action = self.evaluate(memory, decay_score, now);
            let below_threshold = decay_score < self.policy.archive_threshold;

            let result = update_with_retry(
                self.store.as_ref(),
                &memory.id,
                SWEEP_WRITE_ATTEMPTS,
                move |m| {
                    m.decay_score = decay_score;
                    match action {
                        SweepAction::Promote => {
                            if m.tier.can_transition_to(MemoryTier::ShortTerm) {
                                m.tier = MemoryTier::ShortTerm;
                            }
                            m.low_score_streak = 0;
                        },
                        SweepAction::Archive => {
                            if m.tier.can_transition_to(MemoryTier::Archived) {
                                m.tier = MemoryTier::Archived;
                                m.archived_at = Some(Utc::now());
                            }
                            m.low_score_streak += 1;
                        },
                        SweepAction::Rescore => {
                            m.low_score_streak = if below_threshold {
                                m.low_score_streak + 1
                            } else {
                                0
                            };
                        },
                    }
                },
            )
            .await;

            match result {
                Ok(Some(_)) => match action {
                    SweepAction::Promote => report.promoted += 1,
                    SweepAction::Archive => report.archived += 1,
                    SweepAction::Rescore => {},
                },
                Ok(None) => {},
                Err(e) => {
                    // Never fails the sweep; the transition is re-derived and
                    // retried next cycle.
                    report.deferred += 1;
                    warn!(
                        memory_id = %memory.id,
                        error = %e,
                        "sweep transition failed to persist, deferring"
                    );
                },
            }
        }

        metrics::counter!(
            "lifecycle_sweeps_total",
            "status" => if report.deferred == 0 { "success" } else { "partial" }
        )
        .increment(1);
        metrics::histogram!("lifecycle_sweep_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        Ok(report)
    }
}

impl std::fmt::Debug for TierManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierManager")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
