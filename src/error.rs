//! Errors raised by the grading engine.
//!
//! Business outcomes such as a missing English grade or an incomplete senior
//! record are not errors; they are carried in the aggregate itself.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradingError {
    /// A score that is non-numeric or outside 0..=100.
    #[error("invalid score: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The backing store failed to answer a query.
    #[error("store query failed: {0}")]
    Store(String),
}

impl GradingError {
    /// Machine-readable code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            GradingError::Validation(_) => "bad_params",
            GradingError::NotFound(_) => "not_found",
            GradingError::Store(_) => "db_query_failed",
        }
    }
}

impl From<rusqlite::Error> for GradingError {
    fn from(e: rusqlite::Error) -> Self {
        GradingError::Store(e.to_string())
    }
}
