//! Exact-match grouping by content hash.

use crate::models::Memory;
use std::collections::HashMap;

/// Groups memories by `content_hash` and returns every group larger than
/// one, each sorted by id.
///
/// Groups are ordered by their smallest member id so output is
/// deterministic regardless of input order.
#[must_use]
pub fn group_by_hash(memories: &[Memory]) -> Vec<Vec<Memory>> {
    let mut by_hash: HashMap<&str, Vec<&Memory>> = HashMap::new();
    for memory in memories {
        by_hash.entry(&memory.content_hash).or_default().push(memory);
    }

    let mut groups: Vec<Vec<Memory>> = by_hash
        .into_values()
        .filter(|group| group.len() > 1)
        .map(|mut group| {
            group.sort_by(|a, b| a.id.cmp(&b.id));
            group.into_iter().cloned().collect()
        })
        .collect();
    groups.sort_by(|a, b| a[0].id.cmp(&b[0].id));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::current_timestamp;
    use crate::models::{MemoryId, MemoryTier, OwnerScope};

    fn memory_with_hash(id: &str, hash: &str) -> Memory {
        let now = current_timestamp();
        Memory {
            id: MemoryId::new(id),
            owner_scope: OwnerScope::new("s1"),
            content: String::new(),
            embedding: Vec::new(),
            tier: MemoryTier::ShortTerm,
            importance: 0.5,
            decay_score: 0.5,
            content_hash: hash.to_string(),
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            tags: Vec::new(),
            provenance: Vec::new(),
            superseded_by: None,
            archived_at: None,
            low_score_streak: 0,
            version: 0,
        }
    }

    #[test]
    fn test_collisions_grouped_singletons_dropped() {
        let memories = vec![
            memory_with_hash("m3", "aaa"),
            memory_with_hash("m1", "aaa"),
            memory_with_hash("m2", "bbb"),
        ];
        let groups = group_by_hash(&memories);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].id.as_str(), "m1");
        assert_eq!(groups[0][1].id.as_str(), "m3");
    }

    #[test]
    fn test_deterministic_group_order() {
        let memories = vec![
            memory_with_hash("z1", "zzz"),
            memory_with_hash("z2", "zzz"),
            memory_with_hash("a1", "aaa"),
            memory_with_hash("a2", "aaa"),
        ];
        let groups = group_by_hash(&memories);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0][0].id.as_str(), "a1");
        assert_eq!(groups[1][0].id.as_str(), "z1");
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_hash(&[]).is_empty());
    }
}
