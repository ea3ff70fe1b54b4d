//! Scoring and ordering of search candidates.

use std::cmp::Ordering;

use super::query::ExpandedTerm;
use super::{SearchMethod, SearchResult};
use crate::math::cosine_similarity;
use crate::memory::types::BlockType;

/// Credit for a keyword satisfied only through one of its synonyms.
pub const EXPANSION_CREDIT: f32 = 0.75;

const INTENT_BOOST: f32 = 0.1;
const TAG_BOOST: f32 = 0.05;
const MAX_TAG_BOOSTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordMatch {
    /// Fraction of query keywords satisfied, in `[0, 1]`.
    pub score: f32,
    /// Terms (keywords or synonyms) occurring literally in the text.
    pub matching_terms: Vec<String>,
}

/// Score `text` (already lowercased) against the expanded query terms.
pub fn keyword_match(text: &str, keyword_count: usize, terms: &[ExpandedTerm]) -> KeywordMatch {
    let matching: Vec<&ExpandedTerm> = terms.iter().filter(|t| text.contains(t.term.as_str())).collect();

    let mut total = 0.0;
    for source in 0..keyword_count {
        let hits = matching.iter().filter(|t| t.source == source);
        let credit = hits.fold(0.0f32, |best, t| {
            best.max(if t.direct { 1.0 } else { EXPANSION_CREDIT })
        });
        total += credit;
    }

    KeywordMatch {
        score: if keyword_count == 0 {
            0.0
        } else {
            total / keyword_count as f32
        },
        matching_terms: matching.into_iter().map(|t| t.term.clone()).collect(),
    }
}

/// Cosine similarity clamped to `[0, 1]`; `None` when the vectors come from
/// different spaces.
pub fn semantic_score(query: &[f32], block: &[f32]) -> Option<f32> {
    match cosine_similarity(query, block) {
        Ok(s) => Some(s.clamp(0.0, 1.0)),
        Err(e) => {
            tracing::warn!(error = %e, "skipping semantic score");
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub semantic: f32,
    pub keyword: f32,
}

/// Combined similarity for `method`. Hybrid falls back to the keyword score
/// alone when the block has no usable embedding.
pub fn combine(method: SearchMethod, keyword: f32, semantic: Option<f32>, weights: Weights) -> f32 {
    match method {
        SearchMethod::Keyword => keyword,
        SearchMethod::Semantic => semantic.unwrap_or(0.0),
        SearchMethod::Hybrid => match semantic {
            Some(s) => weights.semantic * s + weights.keyword * keyword,
            None => keyword,
        },
    }
}

/// Similarity plus small boosts for intent-suggested types and shared tags.
pub fn relevance(
    similarity: f32,
    block_type: BlockType,
    suggested_types: &[BlockType],
    query_tags: &[String],
    block_tags: &[String],
) -> f32 {
    let mut score = similarity;
    if suggested_types.contains(&block_type) {
        score += INTENT_BOOST;
    }
    let shared = query_tags.iter().filter(|t| block_tags.contains(t)).count();
    score + TAG_BOOST * shared.min(MAX_TAG_BOOSTS) as f32
}

/// Similarity descending, then matching-term count descending, then most
/// recently updated first.
pub fn compare(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| b.matching_terms.len().cmp(&a.matching_terms.len()))
        .then_with(|| b.updated_at.cmp(&a.updated_at))
}
