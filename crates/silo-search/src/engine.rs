//! Keyword search over the index.
//!
//! Ranking is sequence-number descending (most recently ingested first), a
//! deliberate simplicity choice: this domain rewards recency, not relevance
//! scores.  Pagination cursors encode the last returned sequence number, so
//! a page boundary stays correct even when records are tombstoned between
//! calls.

use std::sync::Arc;

use tracing::debug;

use silo_store::{FileRecord, IndexStore};

use crate::error::SearchError;

/// Cursor value marking an exhausted result set.
pub const END_CURSOR: &str = "end";

/// Lowercase and split on non-alphanumeric boundaries, dropping empties.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A keyword query with pagination state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Normalized tokens, AND semantics.
    pub tokens: Vec<String>,
    /// Opaque token from a previous page, or `None` for the first page.
    pub cursor: Option<String>,
    pub page_size: usize,
}

impl SearchQuery {
    /// First page for a free-text query.
    pub fn from_text(text: &str, page_size: usize) -> Self {
        Self {
            tokens: tokenize(text),
            cursor: None,
            page_size,
        }
    }

    /// The follow-up query for the next page.
    pub fn next_page(&self, result: &SearchResult) -> Self {
        Self {
            tokens: self.tokens.clone(),
            cursor: Some(result.next_cursor.clone()),
            page_size: self.page_size,
        }
    }
}

/// One page of matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Matches in sequence-number descending order.
    pub matches: Vec<FileRecord>,
    /// Cursor for the next page, or [`END_CURSOR`].
    pub next_cursor: String,
}

impl SearchResult {
    pub fn is_end(&self) -> bool {
        self.next_cursor == END_CURSOR
    }
}

/// Resolves queries against the index store.
pub struct SearchEngine {
    store: Arc<IndexStore>,
    max_page_size: usize,
}

impl SearchEngine {
    pub fn new(store: Arc<IndexStore>, max_page_size: usize) -> Self {
        Self {
            store,
            max_page_size,
        }
    }

    /// Resolve one page.
    pub async fn query(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        // Tokens may come in raw from callers that skipped `tokenize`.
        let tokens: Vec<String> = query
            .tokens
            .iter()
            .flat_map(|t| tokenize(t))
            .collect();
        if tokens.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if query.page_size == 0 || query.page_size > self.max_page_size {
            return Err(SearchError::InvalidPageSize {
                got: query.page_size,
                max: self.max_page_size,
            });
        }

        let below = match query.cursor.as_deref() {
            None => None,
            Some(END_CURSOR) => {
                return Ok(SearchResult {
                    matches: Vec::new(),
                    next_cursor: END_CURSOR.to_string(),
                })
            }
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| SearchError::BadCursor(raw.to_string()))?,
            ),
        };

        // One extra row tells us whether another page exists.
        let mut matches = self
            .store
            .scan_tokens(&tokens, below, Some(query.page_size + 1))
            .await;

        let next_cursor = if matches.len() > query.page_size {
            matches.truncate(query.page_size);
            matches
                .last()
                .map(|r| r.sequence_no.to_string())
                .unwrap_or_else(|| END_CURSOR.to_string())
        } else {
            END_CURSOR.to_string()
        };

        debug!(
            tokens = ?tokens,
            hits = matches.len(),
            next_cursor = %next_cursor,
            "resolved query page"
        );
        Ok(SearchResult {
            matches,
            next_cursor,
        })
    }
}
