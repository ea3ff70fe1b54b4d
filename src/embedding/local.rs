//! Deterministic feature-hashing embeddings.
//!
//! Needs no model files and no network. Each remaining token contributes its
//! term frequency to a primary bucket and half of it to a secondary bucket;
//! the result is L2-normalized. Identical input always yields a bit-identical
//! vector regardless of token order.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{EmbeddingProvider, EmbeddingVector, ProviderKind, EMBEDDING_DIM};
use crate::error::{Error, Result};
use crate::math::normalize;

pub const LOCAL_MODEL_NAME: &str = "feature-hash";

const MIN_TOKEN_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "this", "that", "with", "from", "they", "will", "would",
    "there", "their", "what", "about", "which", "when", "make", "like", "time", "just", "know",
    "take", "into", "year", "your", "some", "could", "them", "than", "then", "now", "look",
    "only", "come", "its", "over", "also", "back", "after", "use", "how", "well", "way", "even",
    "want", "because", "these", "give", "most", "been", "were", "said", "each", "did", "does",
    "very", "should", "where", "who", "why", "may", "more", "other", "such", "here",
];

pub struct LocalEmbeddingProvider {
    dims: usize,
}

impl LocalEmbeddingProvider {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::Configuration(
                "local embedding dimensions must be greater than zero".into(),
            ));
        }
        Ok(Self { dims })
    }

    /// Synchronous core shared by `embed` and the tests.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dims];
        if tokens.is_empty() {
            return vector;
        }

        // BTreeMap keeps accumulation order fixed, which keeps output bit-identical.
        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_default() += 1;
        }

        let total = tokens.len() as f32;
        let dims = self.dims as u64;
        for (term, count) in counts {
            let tf = count as f32 / total;
            let hash = term_hash(term) as u64;
            vector[(hash % dims) as usize] += tf;
            vector[((hash * 31) % dims) as usize] += 0.5 * tf;
        }

        normalize(&vector)
    }
}

impl Default for LocalEmbeddingProvider {
    fn default() -> Self {
        Self { dims: EMBEDDING_DIM }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn model_name(&self) -> &str {
        LOCAL_MODEL_NAME
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        Ok(EmbeddingVector::new(
            self.embed_text(text),
            LOCAL_MODEL_NAME,
            ProviderKind::Local,
        ))
    }
}

/// Lowercase, split on non-word characters, drop short tokens and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// 32-bit rolling string hash (`h * 31 + unit` over UTF-16 code units),
/// absolute value.
fn term_hash(term: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in term.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(unit as i32);
    }
    hash.unsigned_abs()
}
