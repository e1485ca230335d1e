//! Semantic duplicate clustering.
//!
//! Greedy nearest-neighbor clustering over a consolidation batch. Seeds are
//! the batch members themselves; a neighbor may additionally be an existing
//! long-term memory, so a re-learned fact folds into its consolidated
//! predecessor instead of forming a second canonical copy.

use crate::Result;
use crate::models::{Memory, MemoryId, OwnerScope};
use crate::storage::MemoryStore;
use std::collections::{HashMap, HashSet};

/// Neighbor lookups per seed. One seed only needs enough neighbors to pull
/// its own duplicates in; the rest of the batch seeds separately.
const NEIGHBOR_BUDGET: usize = 8;

/// Clusters `seeds` by vector similarity at or above `threshold`.
///
/// `attachable` is the pool a neighbor may come from (typically the batch
/// plus the scope's long-term memories). Each returned cluster has at least
/// two members, sorted by id; clusters are ordered by their smallest member
/// id. Seeds without an embedding never cluster.
pub async fn cluster_semantic(
    store: &dyn MemoryStore,
    scope: &OwnerScope,
    seeds: &[Memory],
    attachable: &[Memory],
    threshold: f32,
) -> Result<Vec<Vec<Memory>>> {
    let pool: HashMap<&MemoryId, &Memory> =
        attachable.iter().map(|m| (&m.id, m)).collect();

    // Deterministic seed order.
    let mut ordered: Vec<&Memory> = seeds.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let mut assigned: HashSet<MemoryId> = HashSet::new();
    let mut clusters: Vec<Vec<Memory>> = Vec::new();

    for seed in ordered {
        if assigned.contains(&seed.id) || seed.embedding.is_empty() {
            continue;
        }

        let neighbors = store
            .vector_search(scope, &seed.embedding, NEIGHBOR_BUDGET, threshold)
            .await?;

        let mut cluster: Vec<Memory> = vec![seed.clone()];
        for (id, _score) in neighbors {
            if id == seed.id || assigned.contains(&id) {
                continue;
            }
            if let Some(member) = pool.get(&id) {
                cluster.push((*member).clone());
            }
        }

        if cluster.len() > 1 {
            for member in &cluster {
                assigned.insert(member.id.clone());
            }
            cluster.sort_by(|a, b| a.id.cmp(&b.id));
            clusters.push(cluster);
        }
    }

    clusters.sort_by(|a, b| a[0].id.cmp(&b[0].id));
    Ok(clusters)
}
