//! Engine services: retrieval, consolidation, fusion, and the facade.

mod consolidation;
pub mod dedup;
mod engine;
mod fusion;
mod rerank;
mod retrieval;

pub use consolidation::ConsolidationEngine;
pub use engine::MemoryEngine;
pub use fusion::{FusedCandidate, FusionEngine, StageCandidates};
pub use rerank::{Reranker, TermOverlapReranker};
pub use retrieval::HybridRetriever;
