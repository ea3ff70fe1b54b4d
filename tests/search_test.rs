mod helpers;

use std::sync::Arc;

use helpers::{persona, project, test_service};
use strata::config::SearchConfig;
use strata::embedding::local::LocalEmbeddingProvider;
use strata::embedding::EmbeddingProvider;
use strata::math::cosine_similarity;
use strata::memory::service::MemoryService;
use strata::memory::types::{BlockContent, BlockType, Correction, Scope};
use strata::search::{SearchMethod, SearchOptions};
use tempfile::TempDir;

#[tokio::test]
async fn auth_patterns_query_finds_authentication_project() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp).await;

    let mut content = project("gateway", "rust", &["middleware chain"]);
    if let BlockContent::Project(ref mut info) = content {
        info.description = "API gateway handling authentication and rate limits".into();
    }
    service.save_block(content).unwrap();
    service.save_block(persona("Ada", &["patient"])).unwrap();

    let results = service.search("auth patterns", &SearchOptions::default()).await.unwrap();

    assert_eq!(results[0].block_type, BlockType::Project);
    assert!(results[0].matching_terms.contains(&"auth".to_string()));
    assert!(results[0].similarity > 0.0);
    assert_eq!(results[0].scope, Scope::Project);
}

#[tokio::test]
async fn search_all_merges_scopes_under_one_ordering() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp).await;

    service
        .save_block_in(Scope::Global, BlockContent::Corrections(vec![Correction {
            issue: "forgot database migration".into(),
            correction: "run migrations before tests".into(),
            context: None,
            date: "2026-01-01T00:00:00.000Z".into(),
        }]))
        .unwrap();
    service
        .save_block_in(Scope::Project, project("ledger", "go", &["database per service"]))
        .unwrap();

    let options = SearchOptions {
        method: SearchMethod::Keyword,
        ..Default::default()
    };
    let results = service.search_all("database", &options).await.unwrap();

    let scopes: Vec<Scope> = results.iter().map(|r| r.scope).collect();
    assert!(scopes.contains(&Scope::Global));
    assert!(scopes.contains(&Scope::Project));
    assert!(results
        .windows(2)
        .all(|w| w[0].similarity >= w[1].similarity));
}

#[tokio::test]
async fn scope_option_restricts_search_all() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp).await;
    service
        .save_block_in(Scope::Global, project("shared", "rust", &[]))
        .unwrap();
    service
        .save_block_in(Scope::Project, project("local", "rust", &[]))
        .unwrap();

    let options = SearchOptions {
        scope: Some(Scope::Global),
        ..Default::default()
    };
    let results = service.search_all("rust", &options).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.scope == Scope::Global));
}

#[tokio::test]
async fn limit_applies_after_merge() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp).await;
    for scope in Scope::ALL {
        service.save_block_in(scope, project("svc", "rust", &[])).unwrap();
        service.save_block_in(scope, persona("Rustacean", &["rust"])).unwrap();
    }

    let options = SearchOptions {
        limit: 3,
        ..Default::default()
    };
    assert_eq!(service.search_all("rust", &options).await.unwrap().len(), 3);
}

#[tokio::test]
async fn stats_track_searches_per_scope() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp).await;
    service.save_block(project("api", "rust", &[])).unwrap();

    let options = SearchOptions::default();
    service.search("rust", &options).await.unwrap();
    service.search("rust", &options).await.unwrap();

    let stats = service.search_stats(Scope::Project).unwrap();
    assert_eq!(stats.total_searches, 2);
    assert_eq!(stats.top_queries[0].query, "rust");
    assert_eq!(service.search_stats(Scope::Global).unwrap().total_searches, 0);
}

#[tokio::test]
async fn provider_switch_drops_and_rebuilds_embeddings() {
    let tmp = TempDir::new().unwrap();
    {
        let mut service = test_service(&tmp).await;
        service.save_block(project("api", "rust", &[])).unwrap();
        service.reindex(Scope::Project, None).await.unwrap();
        assert_eq!(service.health(Scope::Project).unwrap().embedding_count, 1);
        service.close().unwrap();
    }

    let provider = LocalEmbeddingProvider::new(128).unwrap();
    let key = provider.model_key();
    let mut service = MemoryService::with_provider(
        helpers::scope_manager(&tmp),
        Arc::new(provider),
        SearchConfig::default(),
    );
    service.initialize().await.unwrap();

    let health = service.health(Scope::Project).unwrap();
    assert_eq!(health.embedding_model.as_deref(), Some(key.as_str()));
    assert_eq!(health.embedding_count, 1);

    let results = service
        .search("rust", &SearchOptions { method: SearchMethod::Semantic, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn local_embeddings_are_deterministic_and_topical() {
    let provider = LocalEmbeddingProvider::default();

    let a = provider.embed("rust async runtime scheduling").await.unwrap();
    let again = provider.embed("rust async runtime scheduling").await.unwrap();
    let near = provider.embed("async rust runtime internals").await.unwrap();
    let far = provider.embed("banana bread recipe").await.unwrap();

    assert_eq!(a.values, again.values);
    assert_eq!(a.dimensions, 384);

    let reordered = provider.embed("scheduling runtime async rust").await.unwrap();
    assert_eq!(a.values, reordered.values);

    let near_sim = cosine_similarity(&a.values, &near.values).unwrap();
    let far_sim = cosine_similarity(&a.values, &far.values).unwrap();
    assert!(near_sim > 0.5, "near similarity {near_sim}");
    assert!(near_sim > far_sim);
}
