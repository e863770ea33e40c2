use thiserror::Error;

/// User-input errors on the query path, surfaced verbatim.  A malformed
/// query is never silently answered with an empty page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// No usable tokens.  Not a match-everything wildcard.
    #[error("Empty query")]
    EmptyQuery,

    /// Page size of zero or above the configured maximum.  Hard error; the
    /// engine does not clamp.
    #[error("Invalid page size {got} (must be 1..={max})")]
    InvalidPageSize { got: usize, max: usize },

    /// Cursor that this engine never handed out.
    #[error("Unrecognized cursor: {0}")]
    BadCursor(String),
}
