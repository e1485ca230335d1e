//! # Engram
//!
//! A tiered memory engine for autonomous software agents.
//!
//! Engram governs a continuously growing collection of memory items: where
//! each item lives (tier state machine with decay-driven archival), how it is
//! found again (hybrid vector + lexical + graph retrieval with score fusion),
//! and how the collection stays bounded (scope-locked consolidation that
//! merges duplicates without discarding information).
//!
//! ## Features
//!
//! - Four-tier lifecycle (working, short-term, long-term, archived) with
//!   decay scoring and hysteresis-guarded archival
//! - Three-signal hybrid retrieval with per-stage timeouts and graceful
//!   degradation, fused by weighted scores or reciprocal rank
//! - Two-phase consolidation (exact hash, then strict semantic clustering)
//!   behind a per-scope lock, with all-or-nothing candidate-set commits
//! - Per-scope lifecycle scheduling where a failing scope never blocks others
//! - Pluggable collaborators: storage adapter, embedder, summarizer, and
//!   entity extractor are injected traits with in-process reference
//!   implementations
//!
//! ## Example
//!
//! ```rust,ignore
//! use engram::{AddMemoryRequest, EngineConfig, MemoryEngine, OwnerScope};
//!
//! let engine = MemoryEngine::in_memory(EngineConfig::default());
//! let scope = OwnerScope::new("agent-7");
//! let added = engine.add_memory(&scope, AddMemoryRequest {
//!     content: "Use PostgreSQL for primary storage".to_string(),
//!     importance: 0.8,
//!     ..Default::default()
//! }).await?;
//! let results = engine.search(&scope, "primary storage", &Default::default(), 10).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod embedding;
pub mod extraction;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
pub mod summarize;

// Re-exports for convenience
pub use config::{
    ConsolidationConfig, DecayConfig, EngineConfig, RetrievalConfig, SchedulerConfig, TierPolicy,
};
pub use embedding::Embedder;
pub use extraction::EntityExtractor;
pub use lifecycle::{DecayScorer, LifecycleScheduler, SchedulerHandle, TierManager};
pub use models::{
    AddMemoryRequest, AddMemoryResult, ConsolidationReport, Memory, MemoryId, MemoryTier,
    OwnerScope, SearchFilter, SearchHit, SearchResult, SweepReport,
};
pub use services::{ConsolidationEngine, HybridRetriever, MemoryEngine};
pub use storage::{MemoryStore, ScopeLock};
pub use summarize::Summarizer;

/// Error type for engram operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty content, empty query, malformed filters |
/// | `SchemaViolation` | Invariant breach at the boundary (importance out of range, embedding dimension mismatch, backward tier transition) |
/// | `TransientStore` | Storage adapter I/O failure that may succeed on retry |
/// | `RetrievalUnavailable` | Every retrieval stage failed for one request |
/// | `LockContended` | A scope lock is already held; the caller should skip, not block |
/// | `MergeConflict` | Optimistic version check failed after bounded retries |
/// | `CollaboratorUnavailable` | Embedding or summarization call failed or timed out |
/// | `NotFound` | A referenced memory does not exist |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Content or query text is empty
    /// - A filter references an impossible time range
    /// - A configuration value cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A data-model invariant was breached at the boundary.
    ///
    /// Schema violations are rejected before anything is persisted and fail
    /// loudly to the caller. Raised when:
    /// - `importance` or `confidence` falls outside `[0, 1]`
    /// - An embedding's dimensionality differs from the scope's fixed dimension
    /// - A tier transition moves backward
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// The storage adapter failed in a way that may succeed on retry.
    ///
    /// Callers retry with backoff a bounded number of times; lifecycle sweeps
    /// log and retry on the next cycle instead.
    #[error("transient store failure during '{operation}': {cause}")]
    TransientStore {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Every retrieval stage failed for a single request.
    ///
    /// Individual stage failures degrade gracefully and are annotated in the
    /// result explanation; this variant surfaces only when no signal at all
    /// could be gathered.
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// A scope lock is already held elsewhere.
    ///
    /// This is an expected condition, not a fault: the scheduler skips the
    /// cycle for that scope rather than blocking on it.
    #[error("scope lock contended for '{scope}'")]
    LockContended {
        /// The owner scope whose lock was contended.
        scope: String,
    },

    /// An optimistic version check failed after bounded retries.
    ///
    /// Two writers touched the same record concurrently; disjoint-field
    /// updates are reconciled by re-read-and-retry before this surfaces.
    #[error("merge conflict on memory '{id}' after {attempts} attempts")]
    MergeConflict {
        /// The contested memory id.
        id: String,
        /// How many write attempts were made.
        attempts: u32,
    },

    /// An external collaborator (embedding, summarization) failed or timed out.
    #[error("collaborator '{collaborator}' unavailable: {cause}")]
    CollaboratorUnavailable {
        /// Which collaborator failed.
        collaborator: String,
        /// The underlying cause.
        cause: String,
    },

    /// A referenced memory does not exist.
    #[error("memory not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Returns `true` if the error is worth retrying with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore { .. } | Self::MergeConflict { .. })
    }
}

/// Result type alias for engram operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized to avoid duplicate implementations across the codebase.
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
