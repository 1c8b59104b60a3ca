// Hybrid search ranking module
// Lexical analysis over vector candidates, score filtering, and ordering


use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::store::{ChunkMetadata, QueryHit};

/// Over-fetch multiplier applied to the requested result count.
pub const OVERFETCH_FACTOR: usize = 3;
/// Smallest candidate pool fetched regardless of the requested count.
pub const MIN_CANDIDATE_POOL: usize = 50;

/// Query tokens shorter than this many characters never count as matches.
const MIN_MATCH_TOKEN_CHARS: usize = 3;

/// Candidate pool size for a requested result count.
///
/// The pool is larger than `top_k` because lexical re-ranking can promote
/// chunks from outside the raw top-`top_k` similarity set.
#[inline]
pub fn candidate_pool_size(top_k: usize) -> usize {
    (top_k * OVERFETCH_FACTOR).max(MIN_CANDIDATE_POOL)
}

/// Options controlling filtering and re-ranking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Re-rank candidates using lexical matches in chunk text
    pub include_text_matches: bool,
    /// Drop candidates scoring below this similarity
    pub min_score: f32,
}

impl Default for SearchOptions {
    #[inline]
    fn default() -> Self {
        Self {
            include_text_matches: false,
            min_score: 0.0,
        }
    }
}

/// Lexical signals for one candidate against the query tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexicalMatches {
    /// Whether any query token occurs verbatim in the chunk text
    pub has_direct_match: bool,
    /// Query tokens found in the chunk text, case-insensitively
    pub matched_tokens: Vec<String>,
    /// Matched tokens over all whitespace tokens of the query
    pub score: f32,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub relevance_percentage: u32,
    pub metadata: ChunkMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical: Option<LexicalMatches>,
}

/// Analyze which query tokens occur verbatim in `text`.
///
/// Tokens of one or two characters are ignored as match candidates, but the
/// score denominator still counts every whitespace token of the query.
#[inline]
pub fn analyze_matches(query: &str, text: &str) -> LexicalMatches {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let haystack = text.to_lowercase();

    let matched_tokens: Vec<String> = tokens
        .iter()
        .filter(|token| token.chars().count() >= MIN_MATCH_TOKEN_CHARS)
        .filter(|token| haystack.contains(&token.to_lowercase()))
        .map(|token| (*token).to_string())
        .collect();

    let score = if tokens.is_empty() {
        0.0
    } else {
        matched_tokens.len() as f32 / tokens.len() as f32
    };

    LexicalMatches {
        has_direct_match: !matched_tokens.is_empty(),
        matched_tokens,
        score,
    }
}

/// Similarity score as a whole percentage, clamped at zero.
#[inline]
pub fn relevance_percentage(score: f32) -> u32 {
    (score.max(0.0) * 100.0).round() as u32
}

/// Filter, re-rank, and truncate an over-fetched candidate set.
///
/// Candidates arrive in the store's similarity order. Without
/// `include_text_matches` that order is preserved; with it, results sort by
/// direct-match presence, then lexical score, then similarity. The sort is
/// stable, so a chunk with a direct match never ranks below one without.
#[inline]
pub fn rank_candidates(
    hits: Vec<QueryHit>,
    query: &str,
    top_k: usize,
    options: &SearchOptions,
) -> Vec<SearchResult> {
    let candidates = hits.len();

    let mut results: Vec<SearchResult> = hits
        .into_iter()
        .filter(|hit| hit.score >= options.min_score)
        .map(|hit| {
            let lexical = options
                .include_text_matches
                .then(|| analyze_matches(query, &hit.metadata.text));
            SearchResult {
                id: hit.id,
                score: hit.score,
                relevance_percentage: relevance_percentage(hit.score),
                metadata: hit.metadata,
                lexical,
            }
        })
        .collect();

    if options.include_text_matches {
        results.sort_by(compare_hybrid);
    }

    results.truncate(top_k);

    debug!(
        "Ranked {} of {} candidates (top_k {})",
        results.len(),
        candidates,
        top_k
    );

    results
}

fn compare_hybrid(a: &SearchResult, b: &SearchResult) -> Ordering {
    let a_direct = a.lexical.as_ref().is_some_and(|l| l.has_direct_match);
    let b_direct = b.lexical.as_ref().is_some_and(|l| l.has_direct_match);
    let a_lexical = a.lexical.as_ref().map_or(0.0, |l| l.score);
    let b_lexical = b.lexical.as_ref().map_or(0.0, |l| l.score);

    b_direct
        .cmp(&a_direct)
        .then(b_lexical.partial_cmp(&a_lexical).unwrap_or(Ordering::Equal))
        .then(b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
}
