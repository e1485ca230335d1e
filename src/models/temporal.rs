//! Valid-time tracking for soft invalidation.
//!
//! Relationships are never deleted; they are closed. A closed edge keeps its
//! history queryable (audit paths opt in) while default queries see only
//! currently-valid edges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// When a fact was true, as a half-open interval `[start, end)`.
///
/// `None` on either side means unbounded in that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidTimeRange {
    /// Start of validity (inclusive), `None` for unbounded past.
    pub start: Option<u64>,
    /// End of validity (exclusive), `None` for unbounded future.
    pub end: Option<u64>,
}

impl ValidTimeRange {
    /// Creates an unbounded range (always valid).
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Creates a range valid from `start` onwards.
    #[must_use]
    pub const fn from(start: u64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Creates a bounded range.
    #[must_use]
    pub const fn between(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Checks whether `timestamp` falls within this range.
    #[must_use]
    pub const fn contains(&self, timestamp: u64) -> bool {
        let after_start = match self.start {
            Some(s) => timestamp >= s,
            None => true,
        };
        let before_end = match self.end {
            Some(e) => timestamp < e,
            None => true,
        };
        after_start && before_end
    }

    /// Closes this range at the given timestamp.
    ///
    /// Used to end an open-ended range when a fact stops being true.
    #[must_use]
    pub const fn close_at(self, end: u64) -> Self {
        Self {
            start: self.start,
            end: Some(end),
        }
    }
}

impl Default for ValidTimeRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for ValidTimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (None, None) => write!(f, "[∞, ∞)"),
            (Some(s), None) => write!(f, "[{s}, ∞)"),
            (None, Some(e)) => write!(f, "[∞, {e})"),
            (Some(s), Some(e)) => write!(f, "[{s}, {e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_contains_everything() {
        let range = ValidTimeRange::unbounded();
        assert!(range.contains(0));
        assert!(range.contains(u64::MAX));
    }

    #[test]
    fn test_half_open_semantics() {
        let range = ValidTimeRange::between(100, 200);
        assert!(!range.contains(99));
        assert!(range.contains(100));
        assert!(range.contains(199));
        assert!(!range.contains(200));
    }

    #[test]
    fn test_close_at() {
        let range = ValidTimeRange::from(100);
        assert!(range.end.is_none());

        let closed = range.close_at(200);
        assert_eq!(closed.start, Some(100));
        assert_eq!(closed.end, Some(200));
        assert!(!closed.contains(200));
    }

    #[test]
    fn test_display() {
        assert_eq!(ValidTimeRange::unbounded().to_string(), "[∞, ∞)");
        assert_eq!(ValidTimeRange::between(1, 2).to_string(), "[1, 2)");
    }
}
