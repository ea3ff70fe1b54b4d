//! Search over one scope's memory blocks.
//!
//! [`SearchEngine`] wraps a [`ScopeStore`] and an [`EmbeddingProvider`]. It
//! parses and expands queries, ranks blocks by keyword, semantic, or hybrid
//! similarity, caches results, and records analytics. Embeddings live in a
//! side table and are generated lazily: `initialize` backfills what is
//! missing, and search fills any gaps it meets.

pub mod analytics;
pub mod cache;
pub mod query;
pub mod rank;
pub mod vectors;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SearchConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::memory::store::ScopeStore;
use crate::memory::types::{flatten_text, BlockType, Scope, StoredBlock};
use crate::memory::{now_timestamp, truncate_preview};
use crate::tagger::AutoTagger;

use analytics::{SearchAnalytics, SearchRecord, SearchStats};
use cache::SearchCache;
use query::{embedding_text, expand_terms, parse_query};
use rank::{combine, keyword_match, relevance, semantic_score, Weights};
use vectors::StoredEmbedding;

const PREVIEW_CHARS: usize = 150;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Keyword,
    Semantic,
    #[default]
    Hybrid,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(format!("unknown search method: {s}")),
        }
    }
}

/// Caller-supplied search options. Non-empty filters here take precedence
/// over filters read from the query text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOptions {
    pub method: SearchMethod,
    pub limit: usize,
    /// Defaults to the configured `min_similarity`.
    pub min_similarity: Option<f32>,
    pub types: Vec<BlockType>,
    /// A block matches when it carries any of these tags.
    pub tags: Vec<String>,
    pub scope: Option<Scope>,
    /// Append synonyms for recognized abbreviations.
    pub expand: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            method: SearchMethod::Hybrid,
            limit: 10,
            min_similarity: None,
            types: Vec::new(),
            tags: Vec::new(),
            scope: None,
            expand: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub block_id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub scope: Scope,
    /// In `[0, 1]`; the ordering key.
    pub similarity: f32,
    /// Similarity adjusted by intent and tag affinity.
    pub relevance_score: f32,
    /// Method that actually scored the result.
    pub method: SearchMethod,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matching_terms: Vec<String>,
    pub preview: String,
    pub tags: Vec<String>,
    pub updated_at: String,
}

/// Outcome of an embedding backfill or reindex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub embedded: usize,
    pub failed: usize,
    /// Blocks whose embedding was already current.
    pub up_to_date: usize,
}

/// Progress callback: `(done, total)`.
pub type Progress<'a> = &'a (dyn Fn(usize, usize) + Sync);

pub struct SearchEngine {
    store: ScopeStore,
    provider: Arc<dyn EmbeddingProvider>,
    tagger: AutoTagger,
    config: SearchConfig,
    cache: SearchCache,
    analytics: SearchAnalytics,
    initialized: AtomicBool,
}

impl SearchEngine {
    pub fn new(store: ScopeStore, provider: Arc<dyn EmbeddingProvider>, config: SearchConfig) -> Self {
        Self {
            cache: SearchCache::new(Duration::from_secs(config.cache_ttl_secs), config.cache_max_entries),
            analytics: SearchAnalytics::new(config.analytics_capacity),
            store,
            provider,
            tagger: AutoTagger::new(),
            config,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn scope(&self) -> Scope {
        self.store.scope()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Reconcile the recorded embedding model, then backfill missing
    /// embeddings if configured. Safe to call again.
    pub async fn initialize(&self) -> Result<BackfillReport> {
        if vectors::reconcile_model(&self.store, &self.provider.model_key())? {
            self.cache.clear();
        }
        let report = if self.config.backfill_on_init {
            self.backfill(None).await?
        } else {
            BackfillReport::default()
        };
        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            scope = %self.scope(),
            embedded = report.embedded,
            failed = report.failed,
            "search engine initialized"
        );
        Ok(report)
    }

    /// Embed every block whose embedding is missing or stale.
    ///
    /// Blocks are embedded one at a time so remote providers never see a
    /// burst of requests. A failure for one block is logged and counted; the
    /// rest still run.
    pub async fn backfill(&self, progress: Option<Progress<'_>>) -> Result<BackfillReport> {
        let blocks = self.store.get_all_blocks()?;
        let existing = vectors::load_embeddings(&self.store)?;
        let total = blocks.len();
        let mut report = BackfillReport::default();

        for (done, block) in blocks.iter().enumerate() {
            if is_fresh(existing.get(&block.id), block) {
                report.up_to_date += 1;
            } else {
                match self.embed_block(block).await {
                    Ok(_) => report.embedded += 1,
                    Err(e) => {
                        tracing::warn!(block_id = %block.id, error = %e, "embedding backfill failed");
                        report.failed += 1;
                    }
                }
            }
            if let Some(progress) = progress {
                progress(done + 1, total);
            }
        }
        Ok(report)
    }

    /// Drop all embeddings and regenerate them.
    pub async fn reindex(&self, progress: Option<Progress<'_>>) -> Result<BackfillReport> {
        let cleared = vectors::clear_embeddings(&self.store)?;
        tracing::info!(scope = %self.scope(), cleared, "reindexing embeddings");
        self.cache.clear();
        self.backfill(progress).await
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }
        let started = Instant::now();

        // 1. Cache
        let key = SearchCache::key(query, options);
        if let Some(results) = self.cache.get(&key) {
            tracing::debug!(query, "search cache hit");
            self.record(query, options.method, &results, started, true);
            return Ok(results);
        }

        let (results, method) = self.run_search(query, options).await?;

        // A keyword fallback is not cached, so the next search retries the provider.
        if method == options.method {
            self.cache.insert(key, results.clone());
        }
        self.record(query, method, &results, started, false);
        Ok(results)
    }

    /// Ranked results and the method actually used, which is `Keyword` when
    /// the query embedding failed.
    async fn run_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<(Vec<SearchResult>, SearchMethod)> {
        // 2. Parse and expand
        let parsed = parse_query(query, &self.tagger);
        let terms = expand_terms(&parsed.keywords, options.expand);

        // 3. Filters: caller wins over query text
        let scope = options.scope.or(parsed.scope);
        if scope.is_some_and(|s| s != self.scope()) {
            return Ok((Vec::new(), options.method));
        }
        let types = if options.types.is_empty() {
            &parsed.types
        } else {
            &options.types
        };

        // 4. Candidates are filtered before anything is scored
        let candidates: Vec<(StoredBlock, Vec<String>)> = self
            .store
            .get_all_blocks()?
            .into_iter()
            .filter(|b| types.is_empty() || types.contains(&b.block_type))
            .map(|b| {
                let tags = self.tagger.extract_tags(b.block_type, &b.content).tags;
                (b, tags)
            })
            .filter(|(_, tags)| options.tags.is_empty() || options.tags.iter().any(|t| tags.contains(t)))
            .collect();
        if candidates.is_empty() {
            return Ok((Vec::new(), options.method));
        }

        // 5. Query embedding, unless keyword-only
        let mut method = options.method;
        let query_vector = if method == SearchMethod::Keyword {
            None
        } else {
            let text = if terms.is_empty() {
                parsed.normalized.clone()
            } else {
                embedding_text(&terms)
            };
            match self.provider.embed_query(&text).await {
                Ok(v) => Some(v.values),
                Err(e) => {
                    tracing::warn!(error = %e, "query embedding failed, ranking by keyword");
                    method = SearchMethod::Keyword;
                    None
                }
            }
        };
        let mut embeddings = match query_vector {
            Some(_) => vectors::load_embeddings(&self.store)?,
            None => HashMap::new(),
        };

        // 6. Score
        let weights = Weights {
            semantic: self.config.semantic_weight,
            keyword: self.config.keyword_weight,
        };
        let min_similarity = options.min_similarity.unwrap_or(self.config.min_similarity);
        let mut results = Vec::new();
        for (block, tags) in candidates {
            let text = block.searchable_text();
            let keyword = keyword_match(&text, parsed.keywords.len(), &terms);

            let semantic = match &query_vector {
                Some(qv) => self
                    .block_vector(&block, &mut embeddings)
                    .await
                    .and_then(|bv| semantic_score(qv, &bv)),
                None => None,
            };
            let block_method = match (method, semantic) {
                (SearchMethod::Hybrid, None) => SearchMethod::Keyword,
                (m, _) => m,
            };
            let similarity = combine(method, keyword.score, semantic, weights).clamp(0.0, 1.0);

            if similarity < min_similarity && keyword.matching_terms.is_empty() {
                continue;
            }

            results.push(SearchResult {
                relevance_score: relevance(
                    similarity,
                    block.block_type,
                    &parsed.suggested_types,
                    &parsed.tags,
                    &tags,
                ),
                block_id: block.id.clone(),
                block_type: block.block_type,
                scope: block.scope,
                similarity,
                method: block_method,
                matching_terms: keyword.matching_terms,
                preview: preview(&block),
                tags,
                updated_at: block.updated_at,
            });
        }

        // 7. Order, then limit
        results.sort_by(rank::compare);
        results.truncate(options.limit);
        Ok((results, method))
    }

    /// Current embedding for `block`, generating and storing it if missing
    /// or stale. `None` if the provider fails.
    async fn block_vector(
        &self,
        block: &StoredBlock,
        embeddings: &mut HashMap<String, StoredEmbedding>,
    ) -> Option<Vec<f32>> {
        if let Some(existing) = embeddings.get(&block.id).filter(|e| e.block_version == block.version) {
            return Some(existing.vector.clone());
        }
        match self.embed_block(block).await {
            Ok(vector) => {
                embeddings.insert(
                    block.id.clone(),
                    StoredEmbedding {
                        block_version: block.version,
                        vector: vector.clone(),
                    },
                );
                Some(vector)
            }
            Err(e) => {
                tracing::warn!(block_id = %block.id, error = %e, "lazy embedding failed");
                None
            }
        }
    }

    async fn embed_block(&self, block: &StoredBlock) -> Result<Vec<f32>> {
        let embedding = self.provider.embed(&block.searchable_text()).await?;
        vectors::save_embedding(&self.store, block, &embedding)?;
        Ok(embedding.values)
    }

    fn record(&self, query: &str, method: SearchMethod, results: &[SearchResult], started: Instant, cache_hit: bool) {
        self.analytics.record(SearchRecord {
            query: query.trim().to_lowercase(),
            timestamp: now_timestamp(),
            result_count: results.len(),
            query_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            method,
            cache_hit,
        });
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    pub fn get_stats(&self) -> SearchStats {
        self.analytics.stats()
    }

    pub fn model_key(&self) -> String {
        self.provider.model_key()
    }
}

fn is_fresh(existing: Option<&StoredEmbedding>, block: &StoredBlock) -> bool {
    existing.is_some_and(|e| e.block_version == block.version)
}

fn preview(block: &StoredBlock) -> String {
    let mut text = String::new();
    flatten_text(&block.content, &mut text);
    truncate_preview(text.trim(), PREVIEW_CHARS)
}
