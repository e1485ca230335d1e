//! Duplicate detection for consolidation.
//!
//! Two-phase detection over a candidate batch:
//!
//! 1. **Exact** (O(1) per item): group by content hash; any group larger
//!    than one is an immediate merge candidate set.
//! 2. **Semantic** (bounded): for items without an exact match, nearest-
//!    neighbor lookups at a strict similarity threshold — well above normal
//!    retrieval's floor, so related-but-distinct memories never merge.

mod exact;
mod hasher;
mod semantic;

pub use exact::group_by_hash;
pub use hasher::ContentHasher;
pub use semantic::cluster_semantic;
