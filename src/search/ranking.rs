//! Result ranking
//!
//! Text matches blend normalized BM25 relevance with effective weight;
//! tag-only and unfiltered searches rank by effective weight alone.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::config::RankingWeights;
use crate::intelligence::weight::effective_weight;
use crate::types::{Memory, SearchResult};

/// Normalize raw BM25 scores against the best one in the set.
///
/// SQLite reports BM25 as a negative number where more negative is better,
/// so magnitudes are compared. The best match gets 1.0. Missing scores (and
/// a set where every magnitude is zero) count as fully relevant.
pub fn normalize_relevance(raw: &[Option<f64>]) -> Vec<f64> {
    let best = raw
        .iter()
        .flatten()
        .map(|s| s.abs())
        .fold(0.0_f64, f64::max);

    raw.iter()
        .map(|score| match score {
            Some(s) if best > 0.0 => (s.abs() / best).clamp(0.0, 1.0),
            _ => 1.0,
        })
        .collect()
}

fn by_score(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.memory.updated_at.cmp(&a.memory.updated_at))
        .then_with(|| a.memory.id.cmp(&b.memory.id))
}

/// Rank full-text candidates by `w_relevance * relevance + w_weight * effective_weight`
pub fn rank_text_matches(
    candidates: Vec<(Memory, Option<f64>)>,
    weights: RankingWeights,
    now: DateTime<Utc>,
) -> Vec<SearchResult> {
    let raw: Vec<Option<f64>> = candidates.iter().map(|(_, s)| *s).collect();
    let relevance = normalize_relevance(&raw);

    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .zip(relevance)
        .map(|((memory, _), relevance)| {
            let effective = effective_weight(&memory, now);
            SearchResult {
                score: weights.relevance * relevance + weights.weight * effective,
                relevance: Some(relevance),
                effective_weight: effective,
                memory,
            }
        })
        .collect();

    results.sort_by(by_score);
    results
}

/// Rank candidates by effective weight alone
pub fn rank_by_weight(candidates: Vec<Memory>, now: DateTime<Utc>) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .map(|memory| {
            let effective = effective_weight(&memory, now);
            SearchResult {
                score: effective,
                relevance: None,
                effective_weight: effective,
                memory,
            }
        })
        .collect();

    results.sort_by(by_score);
    results
}
