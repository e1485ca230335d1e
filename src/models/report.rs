//! Reports produced by lifecycle sweeps and consolidation runs.

use super::memory::MemoryId;
use serde::{Deserialize, Serialize};

/// Outcome of one decay/tier sweep over a scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Memories examined.
    pub scanned: usize,
    /// Promotions `Working → ShortTerm`.
    pub promoted: usize,
    /// Archivals out of `ShortTerm`/`LongTerm`.
    pub archived: usize,
    /// Transitions that failed to persist and will be retried next sweep.
    pub deferred: usize,
}

impl SweepReport {
    /// Returns `true` if the sweep changed nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.promoted == 0 && self.archived == 0 && self.deferred == 0
    }
}

/// A candidate set whose merge failed and was left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationError {
    /// The candidate memories involved.
    pub memory_ids: Vec<MemoryId>,
    /// Why the merge was abandoned.
    pub cause: String,
}

/// Outcome of one consolidation run over a scope.
///
/// Partial failures never surface as a bare error: successes and failures
/// are both listed here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationReport {
    /// Candidate memories considered.
    pub candidates: usize,
    /// Duplicate sets found (exact + semantic).
    pub duplicate_sets: usize,
    /// Canonical memories produced (promoted to long-term).
    pub merged: usize,
    /// Duplicates archived with `superseded_by` set.
    pub archived: usize,
    /// Candidate sets left untouched after a failed merge; retried on the
    /// next scheduled run.
    pub errors: Vec<ConsolidationError>,
    /// Run wall time in milliseconds.
    pub duration_ms: u64,
}

impl ConsolidationReport {
    /// Returns `true` if the run found nothing to merge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.duplicate_sets == 0 && self.errors.is_empty()
    }

    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            format!("no duplicates among {} candidates", self.candidates)
        } else {
            format!(
                "candidates: {}, duplicate sets: {}, merged: {}, archived: {}, failed sets: {}",
                self.candidates,
                self.duplicate_sets,
                self.merged,
                self.archived,
                self.errors.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_report_empty() {
        let report = SweepReport::default();
        assert!(report.is_empty());

        let report = SweepReport {
            scanned: 10,
            ..Default::default()
        };
        assert!(report.is_empty(), "scanning alone is not a change");
    }

    #[test]
    fn test_consolidation_summary() {
        let report = ConsolidationReport {
            candidates: 8,
            ..Default::default()
        };
        assert!(report.is_empty());
        assert_eq!(report.summary(), "no duplicates among 8 candidates");

        let report = ConsolidationReport {
            candidates: 8,
            duplicate_sets: 2,
            merged: 2,
            archived: 3,
            errors: vec![ConsolidationError {
                memory_ids: vec![MemoryId::new("a"), MemoryId::new("b")],
                cause: "summarizer timeout".to_string(),
            }],
            duration_ms: 12,
        };
        assert!(!report.is_empty());
        assert!(report.summary().contains("merged: 2"));
        assert!(report.summary().contains("failed sets: 1"));
    }
}
