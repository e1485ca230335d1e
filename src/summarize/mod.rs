//! Content merging.
//!
//! The generative model that merges duplicate contents is an external
//! collaborator behind the [`Summarizer`] trait. The engine's correctness
//! never depends on output quality — only on the availability contract: a
//! call either returns merged text within its deadline or the whole
//! candidate set is left untouched.

use crate::{Error, Result};
use async_trait::async_trait;

/// Trait for merge-summarization providers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produces one text preserving the information of all inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if merging fails; the caller treats the candidate
    /// set as untouched.
    async fn merge(&self, contents: &[&str]) -> Result<String>;
}

/// Concatenating fallback summarizer.
///
/// Joins inputs with a separator instead of abstracting them. Loses nothing,
/// compresses nothing; the right default when no LLM is configured.
pub struct ConcatSummarizer;

impl ConcatSummarizer {
    /// Separator between merged contents.
    const SEPARATOR: &'static str = "\n\n---\n\n";

    /// Creates a new concatenating summarizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for ConcatSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for ConcatSummarizer {
    async fn merge(&self, contents: &[&str]) -> Result<String> {
        if contents.is_empty() {
            return Err(Error::InvalidInput("nothing to merge".to_string()));
        }
        Ok(contents.join(Self::SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_preserves_all_inputs() {
        let summarizer = ConcatSummarizer::new();
        let merged = summarizer.merge(&["first fact", "second fact"]).await.unwrap();
        assert!(merged.contains("first fact"));
        assert!(merged.contains("second fact"));
    }

    #[tokio::test]
    async fn test_merge_single_input_is_identity() {
        let summarizer = ConcatSummarizer::new();
        let merged = summarizer.merge(&["only one"]).await.unwrap();
        assert_eq!(merged, "only one");
    }

    #[tokio::test]
    async fn test_merge_empty_rejected() {
        let summarizer = ConcatSummarizer::new();
        assert!(summarizer.merge(&[]).await.is_err());
    }
}
