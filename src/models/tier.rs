//! Memory tier state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle tier of a memory.
///
/// Tiers only ever move forward: `Working → ShortTerm → LongTerm`, with
/// `Archived` reachable from any tier through archival or consolidation.
/// `Archived` is terminal. No transition deletes data.
///
/// | Tier | Entered By | Default Visibility |
/// |------|------------|--------------------|
/// | `Working` | ingestion | searchable |
/// | `ShortTerm` | age or access promotion | searchable |
/// | `LongTerm` | consolidation only | searchable |
/// | `Archived` | decay archival or merge | excluded unless asked for |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Freshly ingested, not yet reviewed by the lifecycle.
    #[default]
    Working,
    /// Survived the working window; candidate for consolidation.
    ShortTerm,
    /// Deduplicated, consolidated content. Reached only via consolidation.
    LongTerm,
    /// De-surfaced. Terminal; excluded from default retrieval.
    Archived,
}

impl MemoryTier {
    /// Returns the tier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::ShortTerm => "short_term",
            Self::LongTerm => "long_term",
            Self::Archived => "archived",
        }
    }

    /// Ordinal position in the forward progression.
    const fn rank(self) -> u8 {
        match self {
            Self::Working => 0,
            Self::ShortTerm => 1,
            Self::LongTerm => 2,
            Self::Archived => 3,
        }
    }

    /// Returns `true` if a transition from `self` to `next` is legal.
    ///
    /// Legal transitions move strictly forward in the progression; staying
    /// put is not a transition. `Archived` is terminal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Archived => false,
            _ => next.rank() > self.rank(),
        }
    }

    /// Returns `true` for tiers included in default retrieval.
    #[must_use]
    pub const fn is_searchable(&self) -> bool {
        !matches!(self, Self::Archived)
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
