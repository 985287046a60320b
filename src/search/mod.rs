//! Search functionality for Mnemonic
//!
//! Implements:
//! - Tokenized FTS5 query planning with a substring fallback
//! - Tag AND filtering and status filtering
//! - Ranking that blends BM25 relevance with effective weight
//! - Trigger phrase matching

mod fts;
mod ranking;

pub use fts::{plan_query, QueryPlan};
pub use ranking::{normalize_relevance, rank_by_weight, rank_text_matches};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::config::RankingWeights;
use crate::error::Result;
use crate::storage::queries::{self, CandidateFilter};
use crate::types::{Memory, Page, SearchOptions, SearchResult};

/// Execute a search and return one page of ranked results.
///
/// Read-only: access tracking is applied by the caller.
pub fn search_memories(
    conn: &Connection,
    options: &SearchOptions,
    weights: RankingWeights,
    limit: usize,
    offset: usize,
    now: DateTime<Utc>,
) -> Result<Page<SearchResult>> {
    let plan = options
        .query
        .as_deref()
        .map(plan_query)
        .unwrap_or(QueryPlan::Empty);

    let tags: Vec<String> = {
        let mut tags: Vec<String> = options
            .tags
            .iter()
            .flatten()
            .filter_map(|t| queries::normalize_tag(t))
            .collect();
        tags.sort();
        tags.dedup();
        tags
    };

    let mut filter = CandidateFilter {
        tags,
        status: options.status.status(),
        ..Default::default()
    };

    let ranked = match plan {
        QueryPlan::Match(expr) => {
            filter.fts_match = Some(expr);
            let candidates = queries::find_candidates(conn, &filter)?;
            rank_text_matches(candidates, weights, now)
        }
        QueryPlan::Substring(text) => {
            filter.substring = Some(text);
            let candidates = queries::find_candidates(conn, &filter)?;
            rank_text_matches(candidates, weights, now)
        }
        QueryPlan::Empty => {
            let candidates = queries::find_candidates(conn, &filter)?
                .into_iter()
                .map(|(memory, _)| memory)
                .collect();
            rank_by_weight(candidates, now)
        }
    };

    tracing::debug!(
        query = options.query.as_deref().unwrap_or(""),
        matches = ranked.len(),
        "Search executed"
    );

    Ok(Page::from_ranked(ranked, limit, offset))
}

/// Active memories whose trigger phrases occur in `utterance`,
/// highest effective weight first
pub fn match_triggers(
    conn: &Connection,
    utterance: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Memory>> {
    let Some(normalized) = queries::normalize_trigger(utterance) else {
        return Ok(vec![]);
    };

    let ranked = rank_by_weight(queries::find_by_trigger(conn, &normalized)?, now);
    Ok(ranked
        .into_iter()
        .take(limit)
        .map(|result| result.memory)
        .collect())
}
