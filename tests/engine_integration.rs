//! End-to-end flows through the public engine interface.

use engram::{
    AddMemoryRequest, EngineConfig, Error, MemoryEngine, MemoryTier, OwnerScope, SearchFilter,
};

fn request(content: &str, importance: f32) -> AddMemoryRequest {
    AddMemoryRequest {
        content: content.to_string(),
        importance,
        tags: Vec::new(),
        provenance: Vec::new(),
    }
}

#[tokio::test]
async fn round_trip_add_and_search() {
    let engine = MemoryEngine::in_memory(EngineConfig::default());
    let scope = OwnerScope::new("agent-1");

    let added = engine
        .add_memory(
            &scope,
            request("deploys happen from the release branch only", 0.7),
        )
        .await
        .unwrap();

    let result = engine
        .search(
            &scope,
            "deploys happen from the release branch only",
            &SearchFilter::new(),
            10,
        )
        .await
        .unwrap();

    assert_eq!(result.hits[0].memory.id, added.id);
    assert!(
        result.hits[0].vector_score.unwrap() >= 0.99,
        "identical text must be a near-perfect vector match"
    );
    assert!(!result.explanation.degraded);
}

#[tokio::test]
async fn search_isolates_owner_scopes() {
    let engine = MemoryEngine::in_memory(EngineConfig::default());
    engine
        .add_memory(&OwnerScope::new("alice"), request("alice's postgres notes", 0.5))
        .await
        .unwrap();
    engine
        .add_memory(&OwnerScope::new("bob"), request("bob's postgres notes", 0.5))
        .await
        .unwrap();

    let result = engine
        .search(
            &OwnerScope::new("alice"),
            "postgres notes",
            &SearchFilter::new(),
            10,
        )
        .await
        .unwrap();

    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].memory.owner_scope.as_str(), "alice");
}

#[tokio::test]
async fn duplicate_pair_merges_into_long_term_canonical() {
    let engine = MemoryEngine::in_memory(EngineConfig::default());
    let scope = OwnerScope::new("agent-1");

    let first = engine
        .add_memory(&scope, request("the API gateway strips trailing slashes", 0.9))
        .await
        .unwrap();
    let second = engine
        .add_memory(&scope, request("The API gateway strips trailing slashes", 0.3))
        .await
        .unwrap();
    assert_eq!(second.duplicate_of, Some(first.id.clone()));

    let report = engine.run_consolidation(&scope).await.unwrap();
    assert_eq!(report.duplicate_sets, 1);
    assert_eq!(report.merged, 1);
    assert_eq!(report.archived, 1);
    assert!(report.errors.is_empty());

    let canonical = engine.get_memory(&first.id).await.unwrap().unwrap();
    assert_eq!(canonical.tier, MemoryTier::LongTerm);
    assert_eq!(canonical.provenance.len(), 0);

    let archived = engine.get_memory(&second.id).await.unwrap().unwrap();
    assert_eq!(archived.tier, MemoryTier::Archived);
    assert_eq!(archived.superseded_by, Some(first.id.clone()));

    // Archived duplicates disappear from default search but the canonical
    // stays; the list never contains the same logical memory twice.
    let result = engine
        .search(&scope, "API gateway trailing slashes", &SearchFilter::new(), 10)
        .await
        .unwrap();
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].memory.id, first.id);

    // The archived record remains reachable for audit via direct read.
    assert!(engine.get_memory(&second.id).await.unwrap().is_some());
}

#[tokio::test]
async fn consolidation_is_idempotent_on_a_settled_scope() {
    let engine = MemoryEngine::in_memory(EngineConfig::default());
    let scope = OwnerScope::new("agent-1");

    engine
        .add_memory(&scope, request("favor idempotent handlers", 0.8))
        .await
        .unwrap();
    engine
        .add_memory(&scope, request("favor idempotent handlers", 0.2))
        .await
        .unwrap();

    let first = engine.run_consolidation(&scope).await.unwrap();
    assert_eq!(first.merged, 1);

    let second = engine.run_consolidation(&scope).await.unwrap();
    assert_eq!(second.duplicate_sets, 0);
    assert_eq!(second.merged, 0);
    assert_eq!(second.archived, 0);
}

#[tokio::test]
async fn tier_progression_through_sweeps_and_consolidation() {
    // Tight policy so the whole lifecycle fits in one test: one access
    // promotes out of working, and consolidation is the only long-term gate.
    let mut config = EngineConfig::default();
    config.tiers.working_promotion_count = 0;
    config.consolidation.min_age_days = 0.0;

    let engine = MemoryEngine::in_memory(config);
    let scope = OwnerScope::new("agent-1");

    let a = engine
        .add_memory(&scope, request("cache invalidation happens on write", 0.9))
        .await
        .unwrap();
    let b = engine
        .add_memory(&scope, request("cache invalidation happens on write", 0.4))
        .await
        .unwrap();

    // Access pushes past the promotion count; the sweep promotes.
    engine.get_memory(&a.id).await.unwrap();
    engine.get_memory(&b.id).await.unwrap();
    let sweep = engine.sweep(&scope).await.unwrap();
    assert_eq!(sweep.promoted, 2);

    let a_mem = engine.get_memory(&a.id).await.unwrap().unwrap();
    assert_eq!(a_mem.tier, MemoryTier::ShortTerm);

    // Consolidation promotes the canonical to long-term.
    let report = engine.run_consolidation(&scope).await.unwrap();
    assert_eq!(report.merged, 1);
    let canonical = engine.get_memory(&a.id).await.unwrap().unwrap();
    assert_eq!(canonical.tier, MemoryTier::LongTerm);

    // Observed sequence for the canonical was Working → ShortTerm → LongTerm,
    // a subsequence of the legal forward progression.
}

#[tokio::test]
async fn degraded_filter_variants_reuse_same_stages() {
    let engine = MemoryEngine::in_memory(EngineConfig::default());
    let scope = OwnerScope::new("agent-1");

    engine
        .add_memory(
            &scope,
            AddMemoryRequest {
                content: "tagged postgres runbook".to_string(),
                importance: 0.5,
                tags: vec!["runbook".to_string()],
                provenance: Vec::new(),
            },
        )
        .await
        .unwrap();
    engine
        .add_memory(&scope, request("untagged postgres scratch note", 0.5))
        .await
        .unwrap();

    let unfiltered = engine
        .search(&scope, "postgres", &SearchFilter::new(), 10)
        .await
        .unwrap();
    assert_eq!(unfiltered.hits.len(), 2);

    let filtered = engine
        .search(
            &scope,
            "postgres",
            &SearchFilter::new().with_tag("runbook"),
            10,
        )
        .await
        .unwrap();
    assert_eq!(filtered.hits.len(), 1);
    assert!(filtered.hits[0].memory.tags.contains(&"runbook".to_string()));
}

#[tokio::test]
async fn empty_scope_search_returns_empty_not_error() {
    let engine = MemoryEngine::in_memory(EngineConfig::default());
    let result = engine
        .search(
            &OwnerScope::new("nobody"),
            "anything at all",
            &SearchFilter::new(),
            10,
        )
        .await
        .unwrap();
    assert!(result.hits.is_empty());
}

#[tokio::test]
async fn invalid_importance_never_persists() {
    let engine = MemoryEngine::in_memory(EngineConfig::default());
    let scope = OwnerScope::new("agent-1");

    let result = engine.add_memory(&scope, request("broken", 7.0)).await;
    assert!(matches!(result, Err(Error::SchemaViolation(_))));
    assert!(engine.list_scopes().await.unwrap().is_empty());
}
