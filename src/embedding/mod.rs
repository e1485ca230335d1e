//! Embedding generation.
//!
//! The embedding model is an external collaborator behind the [`Embedder`]
//! trait. [`HashEmbedder`] is the in-process reference implementation:
//! deterministic token-hash projections, unit-normalized, so identical text
//! always yields identical vectors. It does not capture semantics — "database
//! storage" and "PostgreSQL" will not be similar — but it keeps the engine
//! fully testable without a model download.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use crate::{Error, Result};
use async_trait::async_trait;

/// Trait for embedding generators.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Cosine similarity of two vectors, normalized to `[0, 1]`.
///
/// Raw cosine ranges over `[-1, 1]`; the midpoint mapping puts orthogonal
/// vectors at 0.5 and opposite vectors at 0. Returns 0.0 for mismatched
/// dimensions or zero-magnitude input.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    f32::midpoint(dot / (norm_a * norm_b), 1.0)
}

/// Deterministic hash-projection embedder.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Default embedding dimensions (matches MiniLM-class models, so swapping
    /// in a real embedder does not change scope dimensionality).
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Word budget per text, bounding work on very long inputs.
    const MAX_WORDS: usize = 1000;

    /// Creates an embedder with the default dimensions.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
        }
    }

    /// Creates an embedder with custom dimensions.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn project(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut embedding = vec![0.0f32; self.dimensions];
        for word in text
            .to_lowercase()
            .split_whitespace()
            .take(Self::MAX_WORDS)
        {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let hash = hasher.finish();
            Self::distribute(&mut embedding, hash, self.dimensions);
        }
        normalize(&mut embedding);
        embedding
    }

    // Bag-of-words on purpose: word order does not move the vector, so a
    // reworded duplicate still lands at similarity 1.0.
    fn distribute(embedding: &mut [f32], hash: u64, dimensions: usize) {
        for j in 0..8 {
            let idx = ((hash >> (j * 8)) as usize) % dimensions;
            let value = ((hash >> (j * 4)) & 0xFF) as f32 / 255.0 - 0.5;
            embedding[idx] += value;
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("cannot embed empty text".to_string()));
        }
        Ok(self.project(text))
    }
}

fn normalize(embedding: &mut [f32]) {
    let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
    if norm_sq <= 0.0 {
        return;
    }
    let inv_norm = norm_sq.sqrt().recip();
    for v in embedding.iter_mut() {
        *v *= inv_norm;
    }
}
