pub mod scoring;

use std::sync::Arc;

use serde::Serialize;

use crate::history::{HistoryRecord, HistoryStore, Result, SectionId};
use self::scoring::score_match;

pub const DEFAULT_SUGGEST_LIMIT: usize = 10;
pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const DEFAULT_CANDIDATE_WINDOW: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub name: String,
    pub last_section_id: SectionId,
    pub last_section_name: String,
    pub usage_count: i64,
}

impl From<HistoryRecord> for Suggestion {
    fn from(record: HistoryRecord) -> Self {
        Suggestion {
            name: record.name,
            last_section_id: record.last_section_id,
            last_section_name: record.last_section_name,
            usage_count: record.usage_count,
        }
    }
}

struct Scored {
    score: i64,
    suggestion: Suggestion,
}

/// Ranks history records against a typed query.
///
/// Holds no state between calls; every query re-reads the candidate window.
pub struct Suggester<S: HistoryStore + ?Sized> {
    store: Arc<S>,
    candidate_window: usize,
}

impl<S: HistoryStore + ?Sized> Suggester<S> {
    pub fn new(store: Arc<S>) -> Self {
        Suggester {
            store,
            candidate_window: DEFAULT_CANDIDATE_WINDOW,
        }
    }

    pub fn with_candidate_window(mut self, candidate_window: usize) -> Self {
        self.candidate_window = candidate_window;
        self
    }

    pub async fn suggest(&self, query: &str, limit: i64) -> Result<Vec<Suggestion>> {
        let limit = normalize_limit(limit, DEFAULT_SUGGEST_LIMIT);
        let candidates = self.store.fetch_candidates(self.candidate_window).await?;
        Ok(rank(candidates, query, limit))
    }

    pub async fn list_all(&self, limit: i64) -> Result<Vec<Suggestion>> {
        let limit = normalize_limit(limit, DEFAULT_LIST_LIMIT);
        let records = self.store.fetch_candidates(limit).await?;
        Ok(records.into_iter().map(Suggestion::from).collect())
    }
}

fn normalize_limit(limit: i64, default: usize) -> usize {
    if limit <= 0 {
        default
    } else {
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

/// Scores, filters, orders and truncates an already fetched candidate window.
pub fn rank(candidates: Vec<HistoryRecord>, query: &str, limit: usize) -> Vec<Suggestion> {
    let mut scored: Vec<Scored> = candidates
        .into_iter()
        .filter_map(|record| {
            let base = score_match(&record.name, query)?;
            Some(Scored {
                score: base + record.usage_count / 10,
                suggestion: Suggestion::from(record),
            })
        })
        .collect();

    // stable: full ties keep the store's popularity order
    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.suggestion.usage_count.cmp(&a.suggestion.usage_count))
    });

    scored.into_iter().take(limit).map(|s| s.suggestion).collect()
}
